//! Windowing combinators.

use super::machine::{Decide, Machine, Step};
use super::Sequence;
use crate::error::Result;
use std::collections::VecDeque;

/// Sequence for the [`buffer`](super::SequenceExt::buffer) method.
pub type Buffer<S> = Machine<S, BufferState<<S as Sequence>::Item>>;

/// Sequence for the [`buffer_stride`](super::SequenceExt::buffer_stride)
/// method.
pub type BufferStride<S> = Machine<S, BufferStrideState<<S as Sequence>::Item>>;

pub(crate) fn buffer<S: Sequence>(upstream: S, size: usize) -> Buffer<S> {
    assert!(size > 0, "buffer size must be non-zero");
    Machine::new(
        upstream,
        BufferState {
            size,
            window: Vec::with_capacity(size),
        },
    )
}

pub(crate) fn buffer_stride<S: Sequence>(
    upstream: S,
    size: usize,
    stride: usize,
) -> BufferStride<S> {
    assert!(size > 0, "buffer size must be non-zero");
    assert!(stride > 0, "buffer stride must be non-zero");
    Machine::new(
        upstream,
        BufferStrideState {
            size,
            stride,
            index: 0,
            windows: VecDeque::new(),
        },
    )
}

/// Decision state for [`Buffer`]: one window at a time, flushed when full,
/// with the final partial window yielded during the drain phase.
#[derive(Debug)]
pub struct BufferState<T> {
    size: usize,
    window: Vec<T>,
}

impl<T> Decide<T> for BufferState<T> {
    type Out = Vec<T>;

    fn decide(&mut self, input: Option<T>) -> Result<Step<Vec<T>>> {
        match input {
            Some(item) => {
                self.window.push(item);
                if self.window.len() == self.size {
                    let full = std::mem::replace(&mut self.window, Vec::with_capacity(self.size));
                    Ok(Step::Yield(full))
                } else {
                    Ok(Step::Skip)
                }
            }
            None if self.window.is_empty() => Ok(Step::Done),
            None => Ok(Step::Yield(std::mem::take(&mut self.window))),
        }
    }
}

/// Decision state for [`BufferStride`]: a FIFO of open windows.
///
/// A window opens at every index divisible by `stride`, each element appends
/// to all open windows, and the oldest window yields when it reaches `size`.
/// With `stride > size` the elements between windows belong to no window and
/// are dropped. Remaining partial windows drain oldest-first at exhaustion.
#[derive(Debug)]
pub struct BufferStrideState<T> {
    size: usize,
    stride: usize,
    index: usize,
    windows: VecDeque<Vec<T>>,
}

impl<T: Clone> Decide<T> for BufferStrideState<T> {
    type Out = Vec<T>;

    fn decide(&mut self, input: Option<T>) -> Result<Step<Vec<T>>> {
        let Some(item) = input else {
            return Ok(self.windows.pop_front().map_or(Step::Done, Step::Yield));
        };

        if self.index % self.stride == 0 {
            self.windows.push_back(Vec::with_capacity(self.size));
        }
        self.index = self.index.wrapping_add(1);

        for window in &mut self.windows {
            window.push(item.clone());
        }

        // Windows open at distinct indices, so at most the oldest can be full.
        if self.windows.front().is_some_and(|w| w.len() == self.size) {
            let full = self.windows.pop_front().unwrap_or_default();
            Ok(Step::Yield(full))
        } else {
            Ok(Step::Skip)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::seq::SequenceExt;
    use crate::source;
    use crate::test_utils::{block_on, init_test};

    #[test]
    fn buffer_windows_and_partial_tail() {
        init_test("buffer_windows_and_partial_tail");
        let out = block_on(source::iter(vec![1, 2, 3, 4, 5]).buffer(2).to_vec()).expect("drain");
        let expected = vec![vec![1, 2], vec![3, 4], vec![5]];
        crate::assert_with_log!(out == expected, "windows", expected, out);
        crate::test_complete!("buffer_windows_and_partial_tail");
    }

    #[test]
    fn buffer_exact_multiple_has_no_empty_tail() {
        init_test("buffer_exact_multiple_has_no_empty_tail");
        let out = block_on(source::iter(vec![1, 2, 3, 4]).buffer(2).to_vec()).expect("drain");
        let expected = vec![vec![1, 2], vec![3, 4]];
        crate::assert_with_log!(out == expected, "windows", expected, out);
        crate::test_complete!("buffer_exact_multiple_has_no_empty_tail");
    }

    #[test]
    #[should_panic(expected = "buffer size must be non-zero")]
    fn buffer_zero_panics() {
        let _ = source::iter(vec![1]).buffer(0);
    }

    #[test]
    fn buffer_stride_overlapping() {
        init_test("buffer_stride_overlapping");
        let out = block_on(source::iter(vec![1, 2, 3, 4, 5]).buffer_stride(3, 1).to_vec())
            .expect("drain");
        let expected = vec![
            vec![1, 2, 3],
            vec![2, 3, 4],
            vec![3, 4, 5],
            vec![4, 5],
            vec![5],
        ];
        crate::assert_with_log!(out == expected, "overlapping", expected, out);
        crate::test_complete!("buffer_stride_overlapping");
    }

    #[test]
    fn buffer_stride_with_gaps_drops_elements() {
        init_test("buffer_stride_with_gaps_drops_elements");
        // stride 3, size 2: element at index 2 of every cycle belongs to no
        // window
        let out = block_on(
            source::iter(vec![1, 2, 3, 4, 5, 6, 7])
                .buffer_stride(2, 3)
                .to_vec(),
        )
        .expect("drain");
        let expected = vec![vec![1, 2], vec![4, 5], vec![7]];
        crate::assert_with_log!(out == expected, "gapped", expected, out);
        crate::test_complete!("buffer_stride_with_gaps_drops_elements");
    }

    #[test]
    fn buffer_stride_equal_is_plain_buffer() {
        init_test("buffer_stride_equal_is_plain_buffer");
        let strided =
            block_on(source::range(0, 6).buffer_stride(2, 2).to_vec()).expect("drain");
        let plain = block_on(source::range(0, 6).buffer(2).to_vec()).expect("drain");
        crate::assert_with_log!(strided == plain, "equivalent", plain, strided);
        crate::test_complete!("buffer_stride_equal_is_plain_buffer");
    }
}
