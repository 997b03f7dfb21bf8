use promet_common::error::AppError;
use promet_common::store::StoreTx;

/// Provider limit on tokens per multicast request, with one slot of headroom.
pub const PAGE_SIZE: i64 = 99;

/// Walks the token table one page at a time, in ascending row id order.
///
/// Page boundaries are keyed by row id and capped at the highest id seen when
/// the walk starts, so tokens deleted or inserted by reconciling an earlier
/// page neither shift later pages nor get sent twice.
#[derive(Debug, Clone)]
pub struct TokenPager {
    page_size: i64,
    pages: i64,
    upper_id: i64,
    after_id: i64,
    served: i64,
    done: bool,
}

impl TokenPager {
    /// Pager over `total` tokens whose row ids are at most `upper_id`.
    pub fn new(total: i64, upper_id: Option<i64>, page_size: i64) -> Self {
        let page_size = page_size.max(1);
        Self {
            page_size,
            pages: page_count(total, page_size),
            upper_id: upper_id.unwrap_or(0),
            after_id: 0,
            served: 0,
            done: upper_id.is_none(),
        }
    }

    /// Open a pager on the tokens visible in `tx` right now.
    pub async fn start<T: StoreTx>(tx: &mut T, page_size: i64) -> Result<Self, AppError> {
        let total = tx.count_tokens().await?;
        let upper_id = tx.max_token_id().await?;
        Ok(Self::new(total, upper_id, page_size))
    }

    pub fn pages(&self) -> i64 {
        self.pages
    }

    /// Index of the page the next call to [`Self::next_page`] returns.
    pub fn position(&self) -> i64 {
        self.served
    }

    /// Fetch the next page, or `None` once every page has been handed out.
    ///
    /// A failed fetch ends the walk, since the next boundary is the last row
    /// id of the page that could not be read.
    pub async fn next_page<T: StoreTx>(&mut self, tx: &mut T) -> Option<Result<Vec<String>, AppError>> {
        if self.done || self.served >= self.pages {
            return None;
        }
        self.served += 1;

        match tx.token_page(self.after_id, self.upper_id, self.page_size).await {
            Ok(rows) => {
                match rows.last() {
                    Some(last) => self.after_id = last.id,
                    None => self.done = true,
                }
                Some(Ok(rows.into_iter().map(|t| t.token).collect()))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// `ceil(total / page_size)`, zero for an empty table.
pub fn page_count(total: i64, page_size: i64) -> i64 {
    if total <= 0 || page_size <= 0 {
        return 0;
    }
    (total + page_size - 1) / page_size
}
