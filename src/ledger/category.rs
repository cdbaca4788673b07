// Two-bucket category used for video folders and ledger codes

use std::fmt;

use crate::constants::{TAGGED, TAGGED_CODE, TAGGED_DANCE_DIR, UNTAGGED, UNTAGGED_CODE, UNTAGGED_DANCE_DIR};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Tagged,
    Untagged,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Tagged, Category::Untagged];

    pub fn code(self) -> u8 {
        match self {
            Category::Tagged => TAGGED_CODE,
            Category::Untagged => UNTAGGED_CODE,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Tagged => TAGGED,
            Category::Untagged => UNTAGGED,
        }
    }

    /// Subdirectory of a unit folder holding this category's videos.
    pub fn dir_name(self) -> &'static str {
        match self {
            Category::Tagged => TAGGED_DANCE_DIR,
            Category::Untagged => UNTAGGED_DANCE_DIR,
        }
    }

    pub fn flipped(self) -> Category {
        match self {
            Category::Tagged => Category::Untagged,
            Category::Untagged => Category::Tagged,
        }
    }

    pub fn from_code(code: u8) -> Option<Category> {
        match code {
            TAGGED_CODE => Some(Category::Tagged),
            UNTAGGED_CODE => Some(Category::Untagged),
            _ => None,
        }
    }

    pub fn from_label(label: &str) -> Option<Category> {
        match label {
            TAGGED => Some(Category::Tagged),
            UNTAGGED => Some(Category::Untagged),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
