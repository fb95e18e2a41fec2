//! Response synthesis and construction.

mod builder;
mod synthesizer;

pub use builder::{MockResponseBuilder, StatusText};
pub use synthesizer::{
    status_text, synthesize, SynthesizedResponse, CONTENT_TYPE_JSON, CONTENT_TYPE_TEXT,
    RULE_ID_HEADER,
};
