//! Prompt implementation over stdin

use anyhow::Result;
use std::io::{self, Write};

use super::SelectItem;

pub struct PrompterImpl;

impl Default for PrompterImpl {
    fn default() -> Self {
        Self::new()
    }
}

impl PrompterImpl {
    pub fn new() -> Self {
        Self
    }

    fn read_line() -> Result<String> {
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(input.trim().to_string())
    }

    /// Parse a 1-based menu answer against the item list. Disabled items
    /// are listed but not selectable.
    pub fn parse_selection(input: &str, items: &[SelectItem]) -> Option<usize> {
        let number: usize = input.parse().ok()?;
        let index = number.checked_sub(1)?;
        if index < items.len() && items[index].enabled {
            Some(index)
        } else {
            None
        }
    }

    /// Render the numbered menu.
    pub fn format_menu(message: &str, header: Option<&str>, items: &[SelectItem]) -> String {
        let mut out = String::new();
        if let Some(header) = header.filter(|h| !h.is_empty()) {
            out.push_str(header);
            out.push('\n');
        }
        out.push_str(message);
        out.push('\n');
        for (i, item) in items.iter().enumerate() {
            if item.enabled {
                out.push_str(&format!("  {}. {}", i + 1, item.label));
            } else {
                out.push_str(&format!("  -  {} (unavailable)", item.label));
            }
            if let Some(hint) = &item.hint {
                out.push_str(&format!(" ({hint})"));
            }
            out.push('\n');
        }
        out
    }

    pub async fn select(
        &self,
        message: &str,
        header: Option<&str>,
        items: &[SelectItem],
    ) -> Result<usize> {
        if !items.iter().any(|i| i.enabled) {
            anyhow::bail!("no selectable choices");
        }

        print!("{}", Self::format_menu(message, header, items));
        print!("Enter choice (1-{}): ", items.len());
        io::stdout().flush()?;

        loop {
            let input = Self::read_line()?;
            if let Some(index) = Self::parse_selection(&input, items) {
                return Ok(index);
            }
            print!("Invalid choice. Please pick an available number: ");
            io::stdout().flush()?;
        }
    }

    pub async fn text(&self, message: &str, default: Option<&str>) -> Result<String> {
        if let Some(default) = default {
            print!("{message} [{default}]: ");
        } else {
            print!("{message}: ");
        }
        io::stdout().flush()?;

        let input = Self::read_line()?;
        if input.is_empty() {
            if let Some(default) = default {
                return Ok(default.to_string());
            }
        }
        Ok(input)
    }

    pub async fn confirm(&self, message: &str) -> Result<bool> {
        print!("{message} [y/N]: ");
        io::stdout().flush()?;

        let input = Self::read_line()?.to_lowercase();
        Ok(input == "y" || input == "yes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<SelectItem> {
        vec![
            SelectItem::new("clone"),
            SelectItem::new("push-branches").enabled(false),
            SelectItem::new("done").hint("autosaved"),
        ]
    }

    #[test]
    fn parse_selection_is_one_based_and_skips_disabled() {
        let items = items();
        assert_eq!(PrompterImpl::parse_selection("1", &items), Some(0));
        assert_eq!(PrompterImpl::parse_selection("2", &items), None);
        assert_eq!(PrompterImpl::parse_selection("3", &items), Some(2));
        assert_eq!(PrompterImpl::parse_selection("0", &items), None);
        assert_eq!(PrompterImpl::parse_selection("4", &items), None);
        assert_eq!(PrompterImpl::parse_selection("x", &items), None);
    }

    #[test]
    fn menu_marks_disabled_items_and_hints() {
        let menu = PrompterImpl::format_menu("available operations", Some("2 repositories"), &items());
        assert_eq!(
            menu,
            "2 repositories\n\
             available operations\n\
             \x20 1. clone\n\
             \x20 -  push-branches (unavailable)\n\
             \x20 3. done (autosaved)\n"
        );
    }
}
