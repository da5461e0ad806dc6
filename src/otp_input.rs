//! Segmented OTP input
//! 1 桁ずつのセル入力（自動フォーカス移動、Backspace、矢印キー、貼り付け）

use crate::auth::OTP_LENGTH;

/// 入力イベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpKey {
    Char(char),
    Backspace,
    Left,
    Right,
    Paste(String),
}

/// セル列の状態。全セルが埋まった最初の時点で 1 回だけ完了コードを返す
#[derive(Debug, Clone)]
pub struct OtpEntry {
    cells: Vec<Option<char>>,
    focus: usize,
    completed: bool,
}

impl Default for OtpEntry {
    fn default() -> Self {
        Self::new(OTP_LENGTH)
    }
}

impl OtpEntry {
    /// `len` 桁の空セル列
    ///
    /// # Panics
    ///
    /// `len == 0` の場合
    pub fn new(len: usize) -> Self {
        assert!(len > 0, "OTP length must be positive");
        Self {
            cells: vec![None; len],
            focus: 0,
            completed: false,
        }
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn value(&self) -> String {
        self.cells.iter().flatten().collect()
    }

    pub fn is_filled(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// フォーカス位置を移動（範囲外はクランプ）
    pub fn focus_at(&mut self, idx: usize) {
        self.focus = idx.min(self.cells.len() - 1);
    }

    /// イベントを処理し、完了した瞬間だけ `Some(code)` を返す
    pub fn handle(&mut self, key: OtpKey) -> Option<String> {
        match key {
            OtpKey::Char(c) => self.type_digit(c),
            OtpKey::Backspace => {
                self.backspace();
                None
            }
            OtpKey::Left => {
                self.focus = self.focus.saturating_sub(1);
                None
            }
            OtpKey::Right => {
                self.focus_at(self.focus + 1);
                None
            }
            OtpKey::Paste(text) => self.paste(&text),
        }
    }

    fn type_digit(&mut self, c: char) -> Option<String> {
        if !c.is_ascii_digit() {
            return None;
        }
        self.cells[self.focus] = Some(c);
        self.focus_at(self.focus + 1);
        self.check_complete()
    }

    fn backspace(&mut self) {
        if self.cells[self.focus].is_some() {
            self.cells[self.focus] = None;
        } else if self.focus > 0 {
            self.focus -= 1;
            self.cells[self.focus] = None;
        }
        self.completed = false;
    }

    /// フォーカス位置から数字だけを順に埋める
    fn paste(&mut self, text: &str) -> Option<String> {
        let mut idx = self.focus;
        for c in text.chars().filter(char::is_ascii_digit) {
            if idx >= self.cells.len() {
                break;
            }
            self.cells[idx] = Some(c);
            idx += 1;
        }
        self.focus_at(idx);
        self.check_complete()
    }

    fn check_complete(&mut self) -> Option<String> {
        if self.completed || !self.is_filled() {
            return None;
        }
        self.completed = true;
        Some(self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typing_six_digits_advances_and_completes_once() {
        let mut entry = OtpEntry::default();
        let mut fired = Vec::new();

        for (i, c) in "123456".chars().enumerate() {
            if let Some(code) = entry.handle(OtpKey::Char(c)) {
                fired.push(code);
            }
            if i < 5 {
                assert_eq!(entry.focus(), i + 1);
            }
        }

        assert_eq!(fired, vec!["123456".to_string()]);
        // 追加入力で再度発火しない
        assert_eq!(entry.handle(OtpKey::Char('9')), None);
    }

    #[test]
    fn paste_into_first_box_fills_all() {
        let mut entry = OtpEntry::default();
        let fired = entry.handle(OtpKey::Paste("123456".into()));
        assert_eq!(fired.as_deref(), Some("123456"));
        assert_eq!(entry.value(), "123456");
        assert_eq!(entry.handle(OtpKey::Paste("123456".into())), None);
    }

    #[test]
    fn paste_ignores_non_digits_and_overflow() {
        let mut entry = OtpEntry::default();
        assert_eq!(
            entry.handle(OtpKey::Paste("12-34 56 78".into())).as_deref(),
            Some("123456")
        );
    }

    #[test]
    fn non_digits_are_ignored() {
        let mut entry = OtpEntry::default();
        assert_eq!(entry.handle(OtpKey::Char('a')), None);
        assert_eq!(entry.focus(), 0);
        assert_eq!(entry.value(), "");
    }

    #[test]
    fn backspace_on_empty_cell_clears_previous() {
        let mut entry = OtpEntry::default();
        entry.handle(OtpKey::Char('1'));
        entry.handle(OtpKey::Char('2'));
        assert_eq!(entry.focus(), 2);

        entry.handle(OtpKey::Backspace);
        assert_eq!(entry.focus(), 1);
        assert_eq!(entry.value(), "1");

        entry.handle(OtpKey::Backspace);
        entry.handle(OtpKey::Backspace);
        assert_eq!(entry.focus(), 0);
        assert_eq!(entry.value(), "");
    }

    #[test]
    fn arrows_move_within_bounds() {
        let mut entry = OtpEntry::default();
        entry.handle(OtpKey::Left);
        assert_eq!(entry.focus(), 0);
        for _ in 0..10 {
            entry.handle(OtpKey::Right);
        }
        assert_eq!(entry.focus(), 5);
    }

    #[test]
    fn completes_again_after_correction() {
        let mut entry = OtpEntry::default();
        assert!(entry.handle(OtpKey::Paste("123456".into())).is_some());
        entry.handle(OtpKey::Backspace);
        assert_eq!(entry.value(), "12345");
        assert_eq!(entry.handle(OtpKey::Char('0')).as_deref(), Some("123450"));
    }

    #[test]
    #[should_panic(expected = "OTP length must be positive")]
    fn zero_length_entry_panics() {
        let _ = OtpEntry::new(0);
    }
}
