use super::UploadError;
use std::collections::VecDeque;
use vela_api::{VelaBuffer, VelaBufferDef, VelaDeviceContext, VelaResult};

/// A range of the upload ring holding data written by the CPU
#[derive(Clone, Debug)]
pub struct UploadAllocation {
    buffer: VelaBuffer,
    offset: u64,
    size: u64,
}

impl UploadAllocation {
    pub fn buffer(&self) -> &VelaBuffer {
        &self.buffer
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

struct UploadFrameInFlight {
    frame: u64,
    // Value of head when the frame finished allocating
    end: u64,
}

/// CPU-visible ring buffer for per-frame uploads.
///
/// `head` and `tail` only grow, the position in the buffer is taken modulo the size. Memory
/// allocated during a frame is released by `retire_frames` once that frame has completed on the
/// GPU. Running out of space is an error, the ring is sized for a frame budget.
pub struct UploadRingBuffer {
    buffer: VelaBuffer,
    size: u64,
    head: u64,
    tail: u64,
    in_flight_frames: VecDeque<UploadFrameInFlight>,
}

impl UploadRingBuffer {
    pub fn new(
        device_context: &VelaDeviceContext,
        size: u64,
    ) -> VelaResult<Self> {
        let buffer = device_context.create_buffer(&VelaBufferDef::for_staging_buffer(size))?;
        Ok(UploadRingBuffer {
            buffer,
            size,
            head: 0,
            tail: 0,
            in_flight_frames: Default::default(),
        })
    }

    pub fn buffer(&self) -> &VelaBuffer {
        &self.buffer
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn bytes_in_use(&self) -> u64 {
        self.head - self.tail
    }

    pub fn bytes_free(&self) -> u64 {
        self.size - self.bytes_in_use()
    }

    /// Reserve `size` bytes aligned to `alignment`. Never wraps an allocation around the end of
    /// the buffer, the remainder is skipped instead.
    pub fn allocate(
        &mut self,
        size: u64,
        alignment: u64,
    ) -> Result<UploadAllocation, UploadError> {
        let alignment = alignment.max(1);
        let position = self.head % self.size;
        let aligned = ((position + alignment - 1) / alignment) * alignment;
        let (offset, padding) = if aligned + size > self.size {
            // Skip the rest of the buffer and start over at zero
            (0, self.size - position)
        } else {
            (aligned, aligned - position)
        };
        let total = padding + size;

        let available = self.bytes_free();
        if size > self.size || total > available {
            return Err(UploadError::BufferFull {
                requested: size,
                available,
            });
        }

        self.head += total;
        log::trace!(
            "Upload ring allocated {} bytes at {} ({} in use)",
            size,
            offset,
            self.bytes_in_use()
        );

        Ok(UploadAllocation {
            buffer: self.buffer.clone(),
            offset,
            size,
        })
    }

    /// Copy `data` into the ring
    pub fn push(
        &mut self,
        data: &[u8],
        alignment: u64,
    ) -> Result<UploadAllocation, UploadError> {
        log::trace!("Pushing {} bytes into upload ring", data.len());
        let allocation = self.allocate(data.len() as u64, alignment)?;
        self.buffer
            .copy_to_host_visible_buffer(data, allocation.offset)?;
        Ok(allocation)
    }

    /// Everything allocated since the previous call belongs to `frame`
    pub fn finish_frame(
        &mut self,
        frame: u64,
    ) {
        self.in_flight_frames.push_back(UploadFrameInFlight {
            frame,
            end: self.head,
        });
    }

    /// Release the memory of every frame up to and including `last_completed_frame`
    pub fn retire_frames(
        &mut self,
        last_completed_frame: u64,
    ) {
        while let Some(in_flight) = self.in_flight_frames.front() {
            if in_flight.frame > last_completed_frame {
                break;
            }

            self.tail = in_flight.end;
            self.in_flight_frames.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_api::null::VelaApiDefNull;
    use vela_api::VelaApi;

    #[test]
    fn test_alignment_and_contents() {
        let api = VelaApi::new_null(&VelaApiDefNull::default()).unwrap();
        let mut ring = UploadRingBuffer::new(&api.device_context(), 256).unwrap();

        let a = ring.push(&[1, 2, 3], 1).unwrap();
        assert_eq!(a.offset(), 0);
        let b = ring.push(&[4, 5, 6, 7], 16).unwrap();
        assert_eq!(b.offset(), 16);
        assert_eq!(ring.bytes_in_use(), 20);

        let contents = ring.buffer().read_host_visible_buffer(16, 4).unwrap();
        assert_eq!(contents, vec![4, 5, 6, 7]);
    }

    #[test]
    fn test_full_until_frame_retires() {
        let api = VelaApi::new_null(&VelaApiDefNull::default()).unwrap();
        let mut ring = UploadRingBuffer::new(&api.device_context(), 128).unwrap();

        ring.allocate(100, 1).unwrap();
        ring.finish_frame(1);

        match ring.allocate(64, 1) {
            Err(UploadError::BufferFull {
                requested,
                available,
            }) => {
                assert_eq!(requested, 64);
                assert_eq!(available, 28);
            }
            other => panic!("unexpected result {:?}", other),
        }

        ring.retire_frames(1);
        assert_eq!(ring.bytes_in_use(), 0);

        // Doesn't fit before the end of the buffer, so it starts over at zero
        let wrapped = ring.allocate(64, 1).unwrap();
        assert_eq!(wrapped.offset(), 0);
        assert_eq!(ring.bytes_in_use(), 28 + 64);
    }

    #[test]
    fn test_oversized_request() {
        let api = VelaApi::new_null(&VelaApiDefNull::default()).unwrap();
        let mut ring = UploadRingBuffer::new(&api.device_context(), 64).unwrap();
        assert!(matches!(
            ring.allocate(65, 1),
            Err(UploadError::BufferFull { .. })
        ));
    }
}
