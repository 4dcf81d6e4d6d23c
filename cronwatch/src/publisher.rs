use crate::event_bus::CronEvent;
use tokio::sync::broadcast;

pub trait Publisher {
    fn publish(
        &self,
        event: CronEvent,
    ) -> Result<usize, broadcast::error::SendError<CronEvent>>;
}
