/// Splits `count` items into pages of `per_page`.
///
/// An empty list still has one (empty) page so that page 1 always renders.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    count: usize,
    per_page: usize,
}

impl Paginator {
    pub fn new(count: usize, per_page: usize) -> Self {
        Self {
            count,
            per_page: per_page.max(1),
        }
    }

    pub fn num_pages(&self) -> usize {
        self.count.div_ceil(self.per_page).max(1)
    }

    /// Resolve a raw `?page=` value to a page number.
    ///
    /// Anything that is not an integer yields page 1; numbers outside
    /// `1..=num_pages` yield the last page.
    pub fn resolve(&self, raw: Option<&str>) -> usize {
        let requested = match raw.map(str::trim).map(str::parse::<i64>) {
            Some(Ok(n)) => n,
            _ => return 1,
        };
        let last = self.num_pages();
        if requested < 1 || requested as u64 > last as u64 {
            last
        } else {
            requested as usize
        }
    }

    pub fn offset(&self, number: usize) -> usize {
        (number.max(1) - 1) * self.per_page
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    pub fn page<T>(&self, number: usize, items: Vec<T>) -> Page<T> {
        Page {
            items,
            number,
            num_pages: self.num_pages(),
            total: self.count,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub number: usize,
    pub current: bool,
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn next_page_number(&self) -> usize {
        (self.number + 1).min(self.num_pages)
    }

    pub fn previous_page_number(&self) -> usize {
        self.number.saturating_sub(1).max(1)
    }

    pub fn has_other_pages(&self) -> bool {
        self.num_pages > 1
    }

    /// Links for every page, flagging the current one.
    pub fn links(&self) -> Vec<PageLink> {
        (1..=self.num_pages)
            .map(|number| PageLink {
                number,
                current: number == self.number,
            })
            .collect()
    }
}
