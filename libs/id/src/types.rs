//! Id types used by the assignment engine.

use crate::define_id;

define_id!(CandidateId, "cand");
define_id!(EventId, "evt");
define_id!(AssignmentId, "asgn");

// One per invocation of the engine; only used to correlate log lines.
define_id!(RunId, "run");
