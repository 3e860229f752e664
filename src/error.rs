use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No NeoDK serial port found. Is the box connected?")]
    PortNotFound,

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}
