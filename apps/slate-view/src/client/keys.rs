use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEventKind};

const WHEEL_LINES: isize = 3;

/// Operator intent decoded from terminal input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewAction {
    Quit,
    ToggleStatus,
    ToggleChooser,
    ChooserUp,
    ChooserDown,
    ChooserToggle,
    ShowAll,
    HideAll,
    OnlyChanged,
    ShowPrefill,
    Reinject,
    ScrollLines(isize),
    ScrollPages(isize),
    ScrollTop,
    ScrollBottom,
    Resize { width: u16, height: u16 },
}

/// Maps one terminal event. Arrow keys drive the column chooser while it is
/// open and scroll the table otherwise.
pub fn map_event(event: &Event, chooser_open: bool) -> Option<ViewAction> {
    match event {
        Event::Key(key) => map_key(key, chooser_open),
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::ScrollUp => Some(ViewAction::ScrollLines(-WHEEL_LINES)),
            MouseEventKind::ScrollDown => Some(ViewAction::ScrollLines(WHEEL_LINES)),
            _ => None,
        },
        Event::Resize(width, height) => Some(ViewAction::Resize {
            width: *width,
            height: *height,
        }),
        _ => None,
    }
}

fn map_key(key: &KeyEvent, chooser_open: bool) -> Option<ViewAction> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(ViewAction::Quit),
            _ => None,
        };
    }
    let action = match key.code {
        KeyCode::Char('q') => ViewAction::Quit,
        KeyCode::Char('s') => ViewAction::ToggleStatus,
        KeyCode::Char('c') => ViewAction::ToggleChooser,
        KeyCode::Char('p') => ViewAction::ShowPrefill,
        KeyCode::Char('i') => ViewAction::Reinject,
        KeyCode::Esc if chooser_open => ViewAction::ToggleChooser,
        KeyCode::Up if chooser_open => ViewAction::ChooserUp,
        KeyCode::Down if chooser_open => ViewAction::ChooserDown,
        KeyCode::Char(' ') if chooser_open => ViewAction::ChooserToggle,
        KeyCode::Char('a') if chooser_open => ViewAction::ShowAll,
        KeyCode::Char('h') if chooser_open => ViewAction::HideAll,
        KeyCode::Char('o') if chooser_open => ViewAction::OnlyChanged,
        KeyCode::Up => ViewAction::ScrollLines(-1),
        KeyCode::Down => ViewAction::ScrollLines(1),
        KeyCode::PageUp => ViewAction::ScrollPages(-1),
        KeyCode::PageDown => ViewAction::ScrollPages(1),
        KeyCode::Home => ViewAction::ScrollTop,
        KeyCode::End => ViewAction::ScrollBottom,
        _ => return None,
    };
    Some(action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventState, MouseEvent};

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn arrows_depend_on_chooser() {
        assert_eq!(
            map_event(&key(KeyCode::Up), false),
            Some(ViewAction::ScrollLines(-1))
        );
        assert_eq!(map_event(&key(KeyCode::Up), true), Some(ViewAction::ChooserUp));
        assert_eq!(map_event(&key(KeyCode::Char('a')), false), None);
        assert_eq!(map_event(&key(KeyCode::Char('o')), true), Some(ViewAction::OnlyChanged));
    }

    #[test]
    fn ctrl_c_quits() {
        let event = Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert_eq!(map_event(&event, false), Some(ViewAction::Quit));
        assert_eq!(
            map_event(&key(KeyCode::Char('c')), false),
            Some(ViewAction::ToggleChooser)
        );
    }

    #[test]
    fn releases_are_ignored() {
        let event = Event::Key(KeyEvent {
            code: KeyCode::Char('s'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        });
        assert_eq!(map_event(&event, false), None);
    }

    #[test]
    fn wheel_scrolls() {
        let event = Event::Mouse(MouseEvent {
            kind: MouseEventKind::ScrollDown,
            column: 0,
            row: 0,
            modifiers: KeyModifiers::NONE,
        });
        assert_eq!(map_event(&event, false), Some(ViewAction::ScrollLines(3)));
    }
}
