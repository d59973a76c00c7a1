//! The thought-of-the-day record and its reply parser.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThoughtOfDay {
    pub speciality: String,
    pub quote: String,
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub link: String,
}

impl ThoughtOfDay {
    /// Extract the first JSON object in `reply` that has the record's shape.
    ///
    /// Models like to wrap the object in prose or a code fence; anything
    /// around the object is ignored.
    pub fn parse(reply: &str) -> Option<Self> {
        reply.match_indices('{').find_map(|(start, _)| {
            serde_json::Deserializer::from_str(&reply[start..])
                .into_iter::<Self>()
                .next()
                .and_then(Result::ok)
        })
    }
}
