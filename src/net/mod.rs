pub mod mqtt;
pub mod portal;
pub mod wifi;
