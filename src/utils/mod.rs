pub mod db_utils;
pub mod rule_cache;
