pub mod detection_log_repository;
