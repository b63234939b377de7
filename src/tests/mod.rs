
mod test_interval;
mod test_memory_store;
