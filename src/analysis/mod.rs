pub mod deviation;
