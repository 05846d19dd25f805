pub mod alerts;
pub mod devices;
pub mod health;
pub mod logs;
pub mod scan;
pub mod stats;
