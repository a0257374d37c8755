pub mod alarm_tracker;
pub mod broadcaster;
pub mod device_registry;
pub mod ingest;
pub mod normalizer;
pub mod notifier;
pub mod thresholds;
