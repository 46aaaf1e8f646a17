mod mask;
pub use mask::Mask;

mod sorted_array;
pub use sorted_array::SortedArray;

mod time_series;
pub use time_series::TimeSeries;
