//! Domain types shared by the store, the review services and the gateway

mod catalog;
mod decision;
mod ids;
mod packet;
mod queue;
mod state;

pub use catalog::{Article, ArticleTopic, Board, FullText, JournalExclusion, Topic};
pub use decision::{Decision, QueueType};
pub use ids::{
    ArticleId, BoardId, Cycle, MeetingId, PacketArticleId, PacketId, PairKey, QueueId, ReasonId,
    ReviewId, StateId, TagId, TopicId, UserId,
};
pub use packet::{
    Disposition, DispositionSummary, NewPacket, NewReview, Packet, PacketArticle, ResponseStatus,
    Review,
};
pub use queue::{
    DisplayFormat, DisplayOptions, QueueDefinition, QueueFilters, SortKey, StagedDecision,
};
pub use state::{
    BoardDecision, BoardDecisionEntry, NewState, StateComment, StateExtra, StateRecord, StateValue,
};
