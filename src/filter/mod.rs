//! User-supplied filters and their compiled form
//!
//! Every filter arrives as a string on the command line, is parsed into a
//! [`FilterSpec`] and compiled exactly once into the [`FilterRegistry`],
//! which is shared read-only by every set evaluation.
//!
//! # Filter strings
//!
//! ```text
//! Type:hash:ip                 header glob         keyGlob:valueGlob
//! References:>=1               header comparison   key:[op]int
//! hashsize:>=1024              header flag         tokenGlob:cmp
//! skbmark:>0x123/0xFF          member option       optionGlob:cmp
//! skbprio:>=2:<=3              member option       optionGlob:cmp
//! >=10                         member count        [op]int
//! 210.*                        member glob/regex   pattern
//! set[AB]                      set exclusion       glob
//! ```

pub mod error;
pub mod matcher;
pub mod registry;
pub mod spec;

pub use error::FilterError;
pub use matcher::{GlobMatcher, MemberPattern, TokenPredicate};
pub use registry::{FilterRegistry, HeaderExclusion, HeaderPredicate};
pub use spec::{FilterArgs, FilterSpec, PatternSpec};
