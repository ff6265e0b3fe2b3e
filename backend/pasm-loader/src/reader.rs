use std::io::Read;
use std::time::Instant;

use crate::errors::LoaderError;

pub const MIN_READ_BUFFER_SIZE: usize = 512;
pub const MAX_READ_BUFFER_SIZE: usize = 4 * 1024 * 1024;
const INITIAL_READ_BUFFER_SIZE: usize = 4096;

/// Reads the remainder of `reader` to the end, adaptively resizing the read
/// buffer: when a read took longer than digesting its bytes took, the buffer
/// grows (fewer, bigger syscalls); when digesting dominated, it shrinks.
///
/// "Digesting" here is just the cost of appending to the output buffer -- the
/// real per-record decode happens in a second pass once the whole body is in
/// memory, so this models the same I/O-vs-processing tradeoff as the
/// original streaming loader without replicating its partial-record carry
/// logic.
pub fn read_body_adaptive<R: Read>(reader: &mut R) -> Result<Vec<u8>, LoaderError> {
    let mut body = Vec::new();
    let mut buffer = vec![0_u8; INITIAL_READ_BUFFER_SIZE];
    let mut buffer_size = INITIAL_READ_BUFFER_SIZE;

    loop {
        let read_start = Instant::now();
        let bytes_read = reader.read(&mut buffer[..buffer_size])?;
        let io_time = read_start.elapsed();

        if bytes_read == 0 {
            break;
        }

        let process_start = Instant::now();
        body.extend_from_slice(&buffer[..bytes_read]);
        let processing_time = process_start.elapsed();

        if io_time > processing_time && buffer_size < MAX_READ_BUFFER_SIZE {
            buffer_size = (buffer_size * 2).min(MAX_READ_BUFFER_SIZE);
            buffer.resize(buffer_size, 0);
            log::debug!("increasing read buffer to {buffer_size} bytes");
        } else if processing_time > io_time && buffer_size > MIN_READ_BUFFER_SIZE {
            buffer_size = (buffer_size / 2).max(MIN_READ_BUFFER_SIZE);
            log::debug!("decreasing read buffer to {buffer_size} bytes");
        }
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_entire_body() {
        let data = vec![7_u8; 10_000];
        let body = read_body_adaptive(&mut &data[..]).unwrap();
        assert_eq!(body, data);
    }

    #[test]
    fn reads_empty_body() {
        let body = read_body_adaptive(&mut &b""[..]).unwrap();
        assert!(body.is_empty());
    }
}
