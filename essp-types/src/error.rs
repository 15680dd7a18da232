pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unknown status code: 0x{0:02X}")]
    UnknownStatus(u8),

    #[error("Unknown unit type: {0}")]
    UnknownUnitType(u8),
}
