pub mod gaps;
pub mod util;

pub use gaps::{channel_gaps, merge_gaps, set_gaps, Gap};
pub use util::{
    has_any_data, pad_set, slice_set, start_end_times, start_end_times_without_gaps, trim_set,
};
