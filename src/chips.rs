//! The decorative chip strip that scrolls while a round is being resolved.
//! It only ever reflects the chip mix; the winner is taken from the backend.

use crate::round::Color;
use rand::{
    Rng,
    seq::SliceRandom,
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChipStrip {
    chips: Vec<Color>,
    offset: usize,
}

impl Default for ChipStrip {
    fn default() -> Self {
        let chips = Color::ALL
            .iter()
            .flat_map(|c| std::iter::repeat_n(*c, c.chip_count()))
            .collect();
        ChipStrip { chips, offset: 0 }
    }
}

impl ChipStrip {
    pub fn shuffle(&mut self) {
        self.shuffle_with(&mut rand::rng());
    }

    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.chips.shuffle(rng);
        self.offset = 0;
    }

    pub fn advance(&mut self, steps: usize) {
        if !self.chips.is_empty() {
            self.offset = (self.offset + steps) % self.chips.len();
        }
    }

    pub fn len(&self) -> usize {
        self.chips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chips.is_empty()
    }

    /// `width` consecutive chips starting at the current offset, wrapping around.
    pub fn window(&self, width: usize) -> Vec<Color> {
        self.chips
            .iter()
            .cycle()
            .skip(self.offset)
            .take(width.min(self.chips.len()))
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use rand::{
        SeedableRng,
        rngs::StdRng,
    };

    fn count(chips: &[Color], color: Color) -> usize {
        chips.iter().filter(|c| **c == color).count()
    }

    #[test]
    fn shuffle_with__keeps_the_chip_mix() {
        // given
        let mut strip = ChipStrip::default();
        let mut rng = StdRng::seed_from_u64(7);

        // when
        strip.shuffle_with(&mut rng);
        let all = strip.window(strip.len());

        // then
        assert_eq!(count(&all, Color::Red), 49);
        assert_eq!(count(&all, Color::Blue), 49);
        assert_eq!(count(&all, Color::Green), 2);
    }

    #[test]
    fn window__wraps_past_the_end() {
        let mut strip = ChipStrip::default();
        strip.advance(99);
        let window = strip.window(3);
        assert_eq!(window, vec![Color::Green, Color::Red, Color::Red]);
    }
}
