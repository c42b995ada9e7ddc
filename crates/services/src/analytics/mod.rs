//! Cross-lesson aggregates: bottlenecks, workload and the review report.

mod bottleneck;
mod review;
mod workload;

pub use bottleneck::{compute_bottleneck_steps, BottleneckStep, BOTTLENECK_LIMIT};
pub use review::{
    compute_review_data, AssigneeGroup, DelayEntry, ReviewData, ReviewStats, StatusGroups,
    WORST_DELAY_LIMIT,
};
pub use workload::{compute_workload, Workload};
