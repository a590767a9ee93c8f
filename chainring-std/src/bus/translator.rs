//! Event translators.
//!
//! A translator fills a claimed slot with the data of a publish request.
//! Slots are recycled, so a translator must overwrite every field a handler
//! might read rather than assume a blank slot.
//!
//! Closures implement the translator traits:
//!
//! ```ignore
//! publisher.publish_one(&|slot: &mut Event, body: &str| {
//!     slot.reset();
//!     slot.retarget("order", "created", "42");
//!     slot.set_body(Some(body.to_string()));
//! }, "{\"id\":42}")?;
//! ```

use chainring_core::Event;

/// Fills a slot without extra arguments.
pub trait EventTranslator<E> {
    /// Overwrite `event` with the data to publish.
    fn translate_to(&self, event: &mut E);
}

/// Fills a slot from one argument.
pub trait EventTranslatorOneArg<E, A> {
    /// Overwrite `event` from `arg0`.
    fn translate_to(&self, event: &mut E, arg0: A);
}

/// Fills a slot from two arguments.
pub trait EventTranslatorTwoArg<E, A, B> {
    /// Overwrite `event` from `arg0` and `arg1`.
    fn translate_to(&self, event: &mut E, arg0: A, arg1: B);
}

/// Fills a slot from three arguments.
pub trait EventTranslatorThreeArg<E, A, B, C> {
    /// Overwrite `event` from `arg0`, `arg1` and `arg2`.
    fn translate_to(&self, event: &mut E, arg0: A, arg1: B, arg2: C);
}

// Blanket impls for closures
impl<E, F> EventTranslator<E> for F
where
    F: Fn(&mut E),
{
    fn translate_to(&self, event: &mut E) {
        (self)(event)
    }
}

impl<E, A, F> EventTranslatorOneArg<E, A> for F
where
    F: Fn(&mut E, A),
{
    fn translate_to(&self, event: &mut E, arg0: A) {
        (self)(event, arg0)
    }
}

impl<E, A, B, F> EventTranslatorTwoArg<E, A, B> for F
where
    F: Fn(&mut E, A, B),
{
    fn translate_to(&self, event: &mut E, arg0: A, arg1: B) {
        (self)(event, arg0, arg1)
    }
}

impl<E, A, B, C, F> EventTranslatorThreeArg<E, A, B, C> for F
where
    F: Fn(&mut E, A, B, C),
{
    fn translate_to(&self, event: &mut E, arg0: A, arg1: B, arg2: C) {
        (self)(event, arg0, arg1, arg2)
    }
}

// ============================================================================
// Translators for the default event record
// ============================================================================

/// Copies a caller-owned [`Event`] into the slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyTranslator;

impl<'a> EventTranslatorOneArg<Event, &'a Event> for CopyTranslator {
    fn translate_to(&self, event: &mut Event, source: &'a Event) {
        event.copy_from(source);
    }
}

/// Resets the slot and classifies it by event type and tag, with an empty key.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventTagTranslator;

impl<'a, 'b> EventTranslatorTwoArg<Event, &'a str, &'b str> for EventTagTranslator {
    fn translate_to(&self, event: &mut Event, kind: &'a str, tag: &'b str) {
        event.reset();
        event.retarget(kind, tag, "");
    }
}

/// Resets the slot and classifies it by event type, tag and key.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventTagKeyTranslator;

impl<'a, 'b, 'c> EventTranslatorThreeArg<Event, &'a str, &'b str, &'c str>
    for EventTagKeyTranslator
{
    fn translate_to(&self, event: &mut Event, kind: &'a str, tag: &'b str, key: &'c str) {
        event.reset();
        event.retarget(kind, tag, key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainring_core::Routable;

    #[test]
    fn event_translators_overwrite_recycled_slots() {
        let mut slot = Event::new("stale", "stale", "stale").with_body("old");

        EventTranslatorThreeArg::translate_to(
            &EventTagKeyTranslator,
            &mut slot,
            "order",
            "created",
            "42",
        );
        assert_eq!(slot.routing_key(), "/order/created/42");
        assert_eq!(slot.body(), None);

        EventTranslatorTwoArg::translate_to(&EventTagTranslator, &mut slot, "user", "deleted");
        assert_eq!(slot.routing_key(), "/user/deleted/");

        let source = Event::routed("/custom").with_attribute("k", "v");
        EventTranslatorOneArg::translate_to(&CopyTranslator, &mut slot, &source);
        assert_eq!(slot, source);
    }

    #[test]
    fn closures_are_translators() {
        let translator = |slot: &mut Event, body: &str| {
            slot.reset();
            slot.set_route("/closure");
            slot.set_body(Some(body.to_string()));
        };
        let mut slot = Event::default();
        EventTranslatorOneArg::translate_to(&translator, &mut slot, "payload");
        assert_eq!(slot.routing_key(), "/closure");
        assert_eq!(slot.body(), Some("payload"));
    }
}
