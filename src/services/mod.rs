mod map_data;

pub use map_data::{ratio, MapData, MapEntry};
