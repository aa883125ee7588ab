use crate::{Entity, Query, Result, RowLabeled, Value};
use futures::{
    Stream, StreamExt,
    stream::{BoxStream, Fuse},
};
use std::{
    pin::Pin,
    task::{Context, Poll},
};

/// One produced item: a hydrated entity, a raw labeled row (no entity type
/// was known for the target), or a scalar such as an update count or a
/// truncate acknowledgement.
#[derive(Debug)]
pub enum Item {
    Entity(Entity),
    Row(RowLabeled),
    Scalar(Value),
}

impl Item {
    pub fn into_entity(self) -> Option<Entity> {
        match self {
            Item::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Item::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn into_row(self) -> Option<RowLabeled> {
        match self {
            Item::Row(row) => Some(row),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Item::Scalar(value) => Some(value),
            _ => None,
        }
    }
}

/// The lazy, forward-only, single-pass output of one executed query.
///
/// Nothing past the currently requested item is fetched or materialized:
/// consuming advances the underlying generator by exactly one pull.
/// Exhaustion is terminal: a drained stream answers "no item" forever and
/// never re-yields.
pub struct ResultStream {
    query: Query,
    inner: Fuse<BoxStream<'static, Result<Item>>>,
}

impl ResultStream {
    pub fn new<S>(query: Query, stream: S) -> Self
    where
        S: Stream<Item = Result<Item>> + Send + 'static,
    {
        Self {
            query,
            inner: stream.boxed().fuse(),
        }
    }

    pub fn empty(query: Query) -> Self {
        Self::new(query, futures::stream::empty())
    }

    /// The query this stream was produced from.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Pull the next item, or `None` once exhausted.
    pub async fn next(&mut self) -> Result<Option<Item>> {
        self.inner.next().await.transpose()
    }

    /// Drain the stream, invoking the callback once per item.
    pub async fn each(&mut self, mut f: impl FnMut(Item)) -> Result<()> {
        while let Some(item) = self.next().await? {
            f(item);
        }
        Ok(())
    }

    /// Lazily transform each pulled item; nothing is materialized eagerly.
    pub fn map<F>(self, f: F) -> ResultStream
    where
        F: FnMut(Item) -> Item + Send + 'static,
    {
        let mut f = f;
        let query = self.query.clone();
        ResultStream::new(query, self.inner.map(move |item| item.map(&mut f)))
    }

    /// Count the remaining items. Destructive: the stream is consumed.
    pub async fn count(mut self) -> Result<u64> {
        let mut count = 0;
        while self.next().await?.is_some() {
            count += 1;
        }
        Ok(count)
    }
}

impl Stream for ResultStream {
    type Item = Result<Item>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for ResultStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultStream")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}
