use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("invalid topic `{0}`")]
    InvalidTopic(String),

    #[error("invalid topic pattern `{0}`")]
    InvalidPattern(String),

    #[error("the bus is disconnected")]
    Disconnected,
}
