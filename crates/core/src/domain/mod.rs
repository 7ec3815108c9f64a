pub mod appointment;
pub mod contact;
pub mod hold;
pub mod interval;
pub mod provider;
pub mod slot;
