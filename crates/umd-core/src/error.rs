use thiserror::Error;

/// Maximum logical address the adapter can latch.
pub const ADDRESS_LIMIT: u64 = 0x100_0000;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("unknown console `{0}`")]
    UnknownConsole(String),

    #[error("{len} bytes at {address:#08x} run past the 24-bit address space")]
    AddressOverflow { address: u32, len: usize },

    #[error("word access at odd address {0:#08x}")]
    UnalignedWord(u32),
}

impl Error {
    /// Checks that `len` bytes starting at `address` stay latchable.
    pub fn check_span(address: u32, len: usize) -> Result<(), Error> {
        if u64::from(address) + len as u64 > ADDRESS_LIMIT {
            return Err(Error::AddressOverflow { address, len });
        }
        Ok(())
    }
}
