//! Feed menu visibility.
//!
//! The menu is a two-state flag.  It starts hidden and every press of the
//! menu key flips it; there is no terminal state.

/// Whether the feed menu is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Hidden,
    Shown,
}

impl Visibility {
    fn flipped(self) -> Self {
        match self {
            Visibility::Hidden => Visibility::Shown,
            Visibility::Shown => Visibility::Hidden,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MenuToggle {
    state: Visibility,
}

impl MenuToggle {
    /// Flip the menu and return the new state.
    pub fn activate(&mut self) -> Visibility {
        self.state = self.state.flipped();
        self.state
    }

    /// Close the menu, e.g. after a feed was picked from it.
    pub fn hide(&mut self) {
        self.state = Visibility::Hidden;
    }

    pub fn state(&self) -> Visibility {
        self.state
    }

    pub fn is_hidden(&self) -> bool {
        self.state == Visibility::Hidden
    }
}
