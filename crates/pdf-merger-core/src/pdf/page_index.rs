//! Validated page index for mupdf, which addresses pages with `i32`.

use std::fmt;

use crate::error::Error;

/// A 0-based page index known to be inside the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageIndex(i32);

impl PageIndex {
    /// Validate `page_num` against `total_pages`.
    pub fn try_from_page_num(page_num: usize, total_pages: usize) -> Result<Self, Error> {
        let out_of_range = || Error::PdfInvalidPage {
            page: page_num,
            total: total_pages,
        };

        if page_num >= total_pages {
            return Err(out_of_range());
        }
        i32::try_from(page_num).map(Self).map_err(|_| out_of_range())
    }

    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// 1-based number, as shown to users.
    #[must_use]
    pub fn human_number(self) -> i64 {
        i64::from(self.0) + 1
    }
}

impl From<PageIndex> for i32 {
    fn from(index: PageIndex) -> Self {
        index.0
    }
}

impl fmt::Display for PageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
