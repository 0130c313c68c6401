use crate::{
    round::Color,
    session::View,
};

/// Changes to the open bet modal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ModalAction {
    OpenBetSlip,
    CloseBetSlip,
    SelectColor(Color),
    CycleColor { forward: bool },
    Input(char),
    Backspace,
}

/// Intent produced by the input layer, independent of how it is rendered.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UserEvent {
    Quit,
    Redraw,
    Navigate(View),
    PlaceBet,
    Modal(ModalAction),
}

/// What the app loop should do after an event was handled.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Flow {
    Continue,
    Quit,
}

/// The capabilities views call into. Wired once by the app loop.
pub trait EventHandlers {
    fn on_navigate(&mut self, view: View);

    /// Submits the bet described by the current slip.
    fn on_bet_placed(&mut self);

    fn on_modal_action(&mut self, action: ModalAction);
}

pub fn dispatch<H: EventHandlers>(handlers: &mut H, event: UserEvent) -> Flow {
    match event {
        UserEvent::Quit => return Flow::Quit,
        UserEvent::Redraw => {}
        UserEvent::Navigate(view) => handlers.on_navigate(view),
        UserEvent::PlaceBet => handlers.on_bet_placed(),
        UserEvent::Modal(action) => handlers.on_modal_action(action),
    }
    Flow::Continue
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[derive(Default)]
    struct RecordingHandlers {
        calls: Vec<String>,
    }

    impl EventHandlers for RecordingHandlers {
        fn on_navigate(&mut self, view: View) {
            self.calls.push(format!("navigate:{}", view.title()));
        }

        fn on_bet_placed(&mut self) {
            self.calls.push("bet".to_string());
        }

        fn on_modal_action(&mut self, action: ModalAction) {
            self.calls.push(format!("modal:{action:?}"));
        }
    }

    #[test]
    fn dispatch__routes_each_event_to_its_handler() {
        // given
        let mut handlers = RecordingHandlers::default();
        let events = [
            UserEvent::Navigate(View::Rolls),
            UserEvent::Modal(ModalAction::SelectColor(Color::Green)),
            UserEvent::PlaceBet,
            UserEvent::Redraw,
        ];

        // when
        let flows: Vec<Flow> = events
            .into_iter()
            .map(|e| dispatch(&mut handlers, e))
            .collect();

        // then
        assert!(flows.iter().all(|f| *f == Flow::Continue));
        assert_eq!(
            handlers.calls,
            vec![
                "navigate:Rolls".to_string(),
                "modal:SelectColor(Green)".to_string(),
                "bet".to_string(),
            ]
        );
    }

    #[test]
    fn dispatch__quit__stops_without_calling_handlers() {
        let mut handlers = RecordingHandlers::default();
        assert_eq!(dispatch(&mut handlers, UserEvent::Quit), Flow::Quit);
        assert!(handlers.calls.is_empty());
    }
}
