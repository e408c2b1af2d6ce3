mod concurrent_watchers;
mod lifecycle;
