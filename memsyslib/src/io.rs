use std::fs::File;
use std::io::{BufRead, Read};

use flate2::bufread::MultiGzDecoder;
use log::debug;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Opens a trace file for sequential reading, decompressing it on the fly if it is gzipped
///
/// The lab traces are distributed gzipped, but uncompressed traces are accepted too
pub fn get_reader(file: File) -> Result<Box<dyn Read>, String> {
    // Compatibility on other systems
    #[cfg(not(unix))]
    {
        use std::io::BufReader;
        // Make sure reads are aligned with whole records, 4096 is the standard block size (or a multiple of it) on most systems
        const BUFFER_SIZE: usize = crate::trace::RECORD_SIZE * 4096;
        decompress_if_gzipped(BufReader::with_capacity(BUFFER_SIZE, file))
    }
    // Memory map the file for speed on unix systems
    #[cfg(unix)]
    {
        use memmap2::{Advice, Mmap};
        use std::io::Cursor;
        let len = file.metadata().map_err(|e| format!("Couldn't read the trace file metadata: {e}"))?.len();
        if len == 0 {
            return Ok(Box::new(std::io::empty()));
        }
        // The map is read only and the file is not expected to change while the simulation runs
        let m = unsafe { Mmap::map(&file) }.map_err(|e| format!("Couldn't memory map the file: {e}"))?;
        m.advise(Advice::Sequential).map_err(|e| format!("Failed to provide access advice to the OS, {e}"))?;
        decompress_if_gzipped(Cursor::new(m))
    }
}

fn decompress_if_gzipped<R: BufRead + 'static>(mut reader: R) -> Result<Box<dyn Read>, String> {
    let head = reader.fill_buf().map_err(|e| format!("Couldn't read the trace file: {e}"))?;
    if head.starts_with(&GZIP_MAGIC) {
        debug!("trace is gzipped, decompressing while reading");
        // Concatenated traces hold one gzip member per part
        Ok(Box::new(MultiGzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}
