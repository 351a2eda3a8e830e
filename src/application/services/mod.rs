pub mod journal_service;
