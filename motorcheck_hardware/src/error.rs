use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("port {0} has no motor plugged in")]
    NotAMotor(usize),
    #[error("port {port} out of range (bus has {ports} ports)")]
    InvalidPort { port: usize, ports: usize },
    #[error("drive {0} mV outside ±12000 mV")]
    DriveOutOfRange(i32),
}

pub type Result<T> = std::result::Result<T, HwError>;
