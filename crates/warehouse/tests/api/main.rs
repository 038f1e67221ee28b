mod helpers;
mod incremental_load;
