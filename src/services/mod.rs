pub mod poll_service;
