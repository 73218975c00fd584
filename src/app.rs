use anyhow::{Context, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::time::{Duration, Instant};

use crate::cards::{Card, CardCollection, CardStore, NewCard};
use crate::config::AppConfig;
use crate::error::ValidationError;
use crate::plan::{self, RechargeOption};

/// How long a status message stays in the info line
const STATUS_TIMEOUT: Duration = Duration::from_secs(3);

/// Rows moved by PageUp/PageDown in the plan table
const PLAN_PAGE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Popup {
    None,
    AddCard,
    Help,
    Confirm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormField {
    #[default]
    Label,
    Balance,
    Outward,
    Return,
}

impl FormField {
    pub const ALL: [FormField; 4] = [FormField::Label, FormField::Balance, FormField::Outward, FormField::Return];

    pub fn title(self) -> &'static str {
        match self {
            FormField::Label => " Label ",
            FormField::Balance => " Balance ",
            FormField::Outward => " Outward price ",
            FormField::Return => " Return price ",
        }
    }

    fn next(self) -> Self {
        match self {
            FormField::Label => FormField::Balance,
            FormField::Balance => FormField::Outward,
            FormField::Outward => FormField::Return,
            FormField::Return => FormField::Label,
        }
    }

    fn prev(self) -> Self {
        match self {
            FormField::Label => FormField::Return,
            FormField::Balance => FormField::Label,
            FormField::Outward => FormField::Balance,
            FormField::Return => FormField::Outward,
        }
    }
}

/// Raw text of the add-card dialog. Parsed only on submit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardForm {
    pub label: String,
    pub balance: String,
    pub outward_price: String,
    pub return_price: String,
    pub focus: FormField,
}

impl CardForm {
    fn prefilled(config: &AppConfig) -> Self {
        Self {
            outward_price: config.default_outward_price.clone().unwrap_or_default(),
            return_price: config.default_return_price.clone().unwrap_or_default(),
            ..Self::default()
        }
    }

    pub fn value(&self, field: FormField) -> &str {
        match field {
            FormField::Label => &self.label,
            FormField::Balance => &self.balance,
            FormField::Outward => &self.outward_price,
            FormField::Return => &self.return_price,
        }
    }

    fn value_mut(&mut self, field: FormField) -> &mut String {
        match field {
            FormField::Label => &mut self.label,
            FormField::Balance => &mut self.balance,
            FormField::Outward => &mut self.outward_price,
            FormField::Return => &mut self.return_price,
        }
    }

    fn to_card(&self) -> Result<NewCard, ValidationError> {
        NewCard::parse(&self.label, &self.balance, &self.outward_price, &self.return_price)
    }
}

pub struct App {
    pub config: AppConfig,
    store: CardStore,

    // Cards and one freshly computed plan per card, same order
    pub cards: CardCollection,
    pub plans: Vec<Vec<RechargeOption>>,
    pub selected: usize,
    pub plan_scroll: usize,

    pub popup: Popup,
    pub form: CardForm,
    pub pending_delete: Option<u64>,

    // Status message (shown in info line, auto-clears after timeout)
    pub status_message: Option<String>,
    pub status_message_time: Option<Instant>,
}

impl App {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let store = CardStore::open(config.data_file.clone())?;
        let cards = store
            .load_or_seed(config.seed_example)
            .await
            .with_context(|| format!("Could not load cards from {}", store.path().display()))?;
        tracing::info!("Loaded {} cards from {}", cards.len(), store.path().display());

        Ok(Self::from_parts(config, store, cards))
    }

    pub fn from_parts(config: AppConfig, store: CardStore, cards: CardCollection) -> Self {
        let mut app = Self {
            form: CardForm::prefilled(&config),
            config,
            store,
            cards,
            plans: Vec::new(),
            selected: 0,
            plan_scroll: 0,
            popup: Popup::None,
            pending_delete: None,
            status_message: None,
            status_message_time: None,
        };
        app.recompute_plans();
        app
    }

    pub fn selected_card(&self) -> Option<&Card> {
        self.cards.cards().get(self.selected)
    }

    pub fn selected_plan(&self) -> &[RechargeOption] {
        self.plans.get(self.selected).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Set a status message (auto-clears after 3 seconds)
    fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_message_time = Some(Instant::now());
    }

    /// Periodic housekeeping from the main loop
    pub fn tick(&mut self) {
        if let Some(since) = self.status_message_time {
            if since.elapsed() >= STATUS_TIMEOUT {
                self.status_message = None;
                self.status_message_time = None;
            }
        }
    }

    fn recompute_plans(&mut self) {
        self.plans = self.cards.cards().iter().map(plan::plan_for).collect();
        if self.selected >= self.cards.len() {
            self.selected = self.cards.len().saturating_sub(1);
        }
        self.plan_scroll = 0;
    }

    async fn persist(&self, cards: &CardCollection) -> Result<()> {
        self.store
            .save_all(cards.cards())
            .await
            .with_context(|| format!("Could not save cards to {}", self.store.path().display()))
    }

    pub async fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        // Handle popups first
        if self.popup != Popup::None {
            return self.handle_popup_key(key).await;
        }

        self.handle_normal_key(key).await
    }

    async fn handle_normal_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.move_down(),
            KeyCode::Char('k') | KeyCode::Up => self.move_up(),

            // Scroll the recharge table of the selected card
            KeyCode::PageDown => {
                let last = self.selected_plan().len().saturating_sub(1);
                self.plan_scroll = (self.plan_scroll + PLAN_PAGE).min(last);
            }
            KeyCode::PageUp => self.plan_scroll = self.plan_scroll.saturating_sub(PLAN_PAGE),

            KeyCode::Char('a') | KeyCode::Char('n') => self.start_add_card(),

            KeyCode::Char('R') | KeyCode::Char('r') => self.refresh().await?,

            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(card) = self.selected_card() {
                    self.pending_delete = Some(card.key);
                    self.popup = Popup::Confirm;
                }
            }

            KeyCode::Char('?') | KeyCode::Char('h') => self.popup = Popup::Help,

            _ => {}
        }
        Ok(())
    }

    async fn handle_popup_key(&mut self, key: KeyEvent) -> Result<()> {
        match self.popup {
            Popup::AddCard => self.handle_form_key(key).await,
            Popup::Help => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('h') | KeyCode::Enter | KeyCode::Char('q')) {
                    self.popup = Popup::None;
                }
                Ok(())
            }
            Popup::Confirm => {
                match key.code {
                    KeyCode::Char('y') | KeyCode::Enter => {
                        self.popup = Popup::None;
                        self.confirm_delete().await?;
                    }
                    KeyCode::Char('n') | KeyCode::Esc => {
                        self.pending_delete = None;
                        self.popup = Popup::None;
                    }
                    _ => {}
                }
                Ok(())
            }
            Popup::None => Ok(()),
        }
    }

    fn move_down(&mut self) {
        if !self.cards.is_empty() {
            self.selected = (self.selected + 1) % self.cards.len();
            self.plan_scroll = 0;
        }
    }

    fn move_up(&mut self) {
        if !self.cards.is_empty() {
            self.selected = self.selected.checked_sub(1).unwrap_or(self.cards.len() - 1);
            self.plan_scroll = 0;
        }
    }

    fn start_add_card(&mut self) {
        self.form = CardForm::prefilled(&self.config);
        self.popup = Popup::AddCard;
    }

    async fn handle_form_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc => {
                self.popup = Popup::None;
                self.set_status("Cancelled");
            }
            KeyCode::Tab | KeyCode::Down => self.form.focus = self.form.focus.next(),
            KeyCode::BackTab | KeyCode::Up => self.form.focus = self.form.focus.prev(),
            KeyCode::Enter => self.submit_form().await?,
            KeyCode::Backspace => {
                self.form.value_mut(self.form.focus).pop();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.form.value_mut(self.form.focus).push(c);
            }
            _ => {}
        }
        Ok(())
    }

    /// Validate the dialog, add the card and save the collection.
    /// The in-memory list only changes once the save went through; invalid
    /// input or a failed save keeps the dialog open.
    async fn submit_form(&mut self) -> Result<()> {
        let draft = match self.form.to_card() {
            Ok(draft) => draft,
            Err(e) => {
                self.set_status(format!("Invalid input: {}", e));
                return Ok(());
            }
        };

        let mut updated = self.cards.clone();
        let key = updated.add(draft).key;
        self.persist(&updated).await?;

        self.cards = updated;
        self.popup = Popup::None;
        self.recompute_plans();
        self.selected = self.cards.len() - 1;
        self.set_status(format!("Added card #{}", key));
        Ok(())
    }

    async fn confirm_delete(&mut self) -> Result<()> {
        let Some(key) = self.pending_delete.take() else {
            return Ok(());
        };

        let mut updated = self.cards.clone();
        updated.remove(key)?;
        self.persist(&updated).await?;

        self.cards = updated;
        self.recompute_plans();
        self.set_status(format!("Deleted card #{}", key));
        Ok(())
    }

    /// Reload every card from storage and recompute their plans
    pub async fn refresh(&mut self) -> Result<()> {
        let cards = self
            .store
            .load_all()
            .await
            .with_context(|| format!("Could not load cards from {}", self.store.path().display()))?;

        self.cards = CardCollection::new(cards.unwrap_or_default());
        self.recompute_plans();
        self.set_status(format!("Refreshed {} cards", self.cards.len()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    async fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c))).await.unwrap();
        }
    }

    fn app_in(dir: &tempfile::TempDir, cards: Vec<Card>) -> App {
        let store = CardStore::at(dir.path().join("cards.json"));
        App::from_parts(AppConfig::default(), store, CardCollection::new(cards))
    }

    #[tokio::test]
    async fn test_add_card_through_form() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(&dir, Vec::new());

        app.handle_key(key(KeyCode::Char('a'))).await.unwrap();
        assert_eq!(app.popup, Popup::AddCard);

        type_text(&mut app, "bus").await;
        app.handle_key(key(KeyCode::Tab)).await.unwrap();
        type_text(&mut app, "13.92").await;
        app.handle_key(key(KeyCode::Tab)).await.unwrap();
        type_text(&mut app, "6.96").await;
        app.handle_key(key(KeyCode::Tab)).await.unwrap();
        type_text(&mut app, "6.96").await;
        app.handle_key(key(KeyCode::Enter)).await.unwrap();

        assert_eq!(app.popup, Popup::None);
        assert_eq!(app.cards.len(), 1);
        assert_eq!(app.selected_card().unwrap().label, "bus");
        assert_eq!(app.selected_plan()[0].credit_recharge, Money::ZERO);
        assert_eq!(app.status_message.as_deref(), Some("Added card #0"));

        let stored = app.store.load_all().await.unwrap().unwrap();
        assert_eq!(stored, app.cards.cards());
    }

    #[tokio::test]
    async fn test_invalid_amount_keeps_form_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(&dir, Vec::new());

        app.handle_key(key(KeyCode::Char('n'))).await.unwrap();
        app.handle_key(key(KeyCode::Tab)).await.unwrap();
        type_text(&mut app, "abc").await;
        app.handle_key(key(KeyCode::Enter)).await.unwrap();

        assert_eq!(app.popup, Popup::AddCard);
        assert!(app.cards.is_empty());
        assert!(app.status_message.as_deref().unwrap().contains("not a valid amount"));
        assert!(app.store.load_all().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_form_is_prefilled_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(&dir, Vec::new());
        app.config.default_outward_price = Some("1.45".to_string());

        app.handle_key(key(KeyCode::Char('a'))).await.unwrap();
        assert_eq!(app.form.value(FormField::Outward), "1.45");
        assert_eq!(app.form.value(FormField::Return), "");
        assert_eq!(app.form.focus, FormField::Label);
    }

    #[tokio::test]
    async fn test_escape_cancels_form() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(&dir, Vec::new());

        app.handle_key(key(KeyCode::Char('a'))).await.unwrap();
        type_text(&mut app, "q").await;
        app.handle_key(key(KeyCode::Esc)).await.unwrap();

        assert_eq!(app.popup, Popup::None);
        assert!(app.cards.is_empty());
    }

    #[tokio::test]
    async fn test_delete_requires_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(&dir, vec![Card::example()]);

        app.handle_key(key(KeyCode::Char('d'))).await.unwrap();
        assert_eq!(app.popup, Popup::Confirm);
        app.handle_key(key(KeyCode::Char('n'))).await.unwrap();
        assert_eq!(app.cards.len(), 1);

        app.handle_key(key(KeyCode::Char('d'))).await.unwrap();
        app.handle_key(key(KeyCode::Char('y'))).await.unwrap();
        assert!(app.cards.is_empty());
        assert!(app.plans.is_empty());
        assert_eq!(app.store.load_all().await.unwrap(), Some(Vec::new()));
    }

    /// A store whose parent directory is a regular file, so every save fails
    fn unwritable_app(dir: &tempfile::TempDir, cards: Vec<Card>) -> App {
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let store = CardStore::at(blocker.join("cards.json"));
        App::from_parts(AppConfig::default(), store, CardCollection::new(cards))
    }

    #[tokio::test]
    async fn test_failed_save_keeps_card_out_and_form_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = unwritable_app(&dir, Vec::new());

        app.handle_key(key(KeyCode::Char('a'))).await.unwrap();
        type_text(&mut app, "bus").await;
        for amount in ["13.92", "6.96", "6.96"] {
            app.handle_key(key(KeyCode::Tab)).await.unwrap();
            type_text(&mut app, amount).await;
        }

        let err = app.handle_key(key(KeyCode::Enter)).await.unwrap_err();
        assert!(err.to_string().contains("Could not save cards"));
        assert!(app.cards.is_empty());
        assert!(app.plans.is_empty());
        assert_eq!(app.popup, Popup::AddCard);
        assert_eq!(app.form.label, "bus");
    }

    #[tokio::test]
    async fn test_failed_save_keeps_deleted_card() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = unwritable_app(&dir, vec![Card::example()]);

        app.handle_key(key(KeyCode::Char('d'))).await.unwrap();
        assert!(app.handle_key(key(KeyCode::Char('y'))).await.is_err());

        assert_eq!(app.cards.len(), 1);
        assert_eq!(app.plans.len(), 1);
        assert_eq!(app.selected_card().unwrap().key, 0);
        assert_eq!(app.popup, Popup::None);
    }

    #[tokio::test]
    async fn test_refresh_reloads_storage() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(&dir, Vec::new());

        let mut changed = CardCollection::new(vec![Card::example()]);
        changed.add(NewCard::parse("tram", "0", "2.50", "2.50").unwrap());
        app.store.save_all(changed.cards()).await.unwrap();

        app.handle_key(key(KeyCode::Char('R'))).await.unwrap();

        assert_eq!(app.cards, changed);
        assert_eq!(app.plans.len(), 2);
        assert_eq!(app.plans[1].len(), 200);
    }

    #[tokio::test]
    async fn test_selection_wraps() {
        let dir = tempfile::tempdir().unwrap();
        let mut cards = CardCollection::new(vec![Card::example()]);
        cards.add(NewCard::parse("", "1", "1", "1").unwrap());
        let mut app = app_in(&dir, cards.cards().to_vec());

        app.handle_key(key(KeyCode::Up)).await.unwrap();
        assert_eq!(app.selected, 1);
        app.handle_key(key(KeyCode::Char('j'))).await.unwrap();
        assert_eq!(app.selected, 0);
    }

    #[tokio::test]
    async fn test_plan_scroll_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(&dir, vec![Card::example()]);

        for _ in 0..5 {
            app.handle_key(key(KeyCode::PageDown)).await.unwrap();
        }
        assert_eq!(app.plan_scroll, app.selected_plan().len() - 1);

        app.handle_key(key(KeyCode::PageUp)).await.unwrap();
        assert_eq!(app.plan_scroll, app.selected_plan().len() - 1 - PLAN_PAGE);
    }

    #[test]
    fn test_status_message_expires() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(&dir, Vec::new());

        app.set_status("hello");
        app.tick();
        assert!(app.status_message.is_some());

        app.status_message_time = Some(Instant::now() - STATUS_TIMEOUT);
        app.tick();
        assert!(app.status_message.is_none());
    }
}
