mod chat_cycle;
mod config;
mod context_usage;
mod turns;
