mod helpers;
mod round_trip;
