pub mod beeper;
pub mod pcd8544;
