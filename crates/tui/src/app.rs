use std::{cmp, io, path::PathBuf, thread, time::Duration};

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use dhtui_core::{
    catalog::{CardCatalog, CatalogLoad, CatalogStatus},
    config::AppConfig,
    error::{CatalogLoadError, ExportError},
    export::{
        archive_file_name, build_archive, build_print_layout, open_preview, ExportSelection,
        PrintOutcome,
    },
    models::{Card, Domain},
    resource::ResourceClient,
    rules::{self, DomainMode, RuleSet},
    save::{CharacterSave, SaveEntry, SaveManager},
    selection::SelectionStore,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::{spawn, sync::mpsc};
use tracing::{error, info, warn};

const TICK_RATE: Duration = Duration::from_millis(250);
const MAX_PROMPT_LEN: usize = 128;
const PREVIEW_FILE: &str = "stampa.html";

#[derive(Debug, Clone)]
struct Theme {
    primary_fg: Color,
    accent: Color,
    muted: Color,
    selection_bg: Color,
    success: Color,
    warning: Color,
    danger: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_fg: Color::White,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            selection_bg: Color::DarkGray,
            success: Color::Green,
            warning: Color::Yellow,
            danger: Color::Red,
        }
    }
}

impl Theme {
    fn domain(&self, domain: Domain) -> Color {
        let (r, g, b) = rules::domain_info(domain).color;
        Color::Rgb(r, g, b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Loading,
    Builder,
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Panel {
    Class,
    Subclass,
    Domains,
    Abilities,
    Origin,
    Community,
}

impl Panel {
    const ALL: [Panel; 6] = [
        Panel::Class,
        Panel::Subclass,
        Panel::Domains,
        Panel::Abilities,
        Panel::Origin,
        Panel::Community,
    ];

    fn index(self) -> usize {
        Panel::ALL
            .iter()
            .position(|panel| *panel == self)
            .unwrap_or(0)
    }

    fn step(self, delta: isize) -> Panel {
        let len = Panel::ALL.len() as isize;
        let next = (self.index() as isize + delta).rem_euclid(len);
        Panel::ALL[next as usize]
    }

    fn title(self) -> &'static str {
        match self {
            Panel::Class => "Classe",
            Panel::Subclass => "Sottoclasse",
            Panel::Domains => "Domini",
            Panel::Abilities => "Abilità",
            Panel::Origin => "Origine",
            Panel::Community => "Comunità",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PanelAction {
    Class(String),
    Subclass(&'static str),
    Domain(Domain),
    Ability(String),
    Origin(String),
    Community(String),
}

#[derive(Debug, Clone)]
struct PanelItem {
    label: String,
    selected: bool,
    color: Option<Color>,
    action: PanelAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptPurpose {
    CharacterName,
    ImportPath,
}

#[derive(Debug, Clone)]
struct PromptModal {
    purpose: PromptPurpose,
    input: String,
    cursor: usize,
    default: String,
}

impl PromptModal {
    fn new(purpose: PromptPurpose, default: String) -> Self {
        let cursor = default.chars().count();
        Self {
            purpose,
            input: default.clone(),
            cursor,
            default,
        }
    }

    fn len(&self) -> usize {
        self.input.chars().count()
    }

    fn byte_index(&self, cursor: usize) -> usize {
        self.input
            .char_indices()
            .nth(cursor)
            .map(|(idx, _)| idx)
            .unwrap_or(self.input.len())
    }

    fn move_cursor(&mut self, delta: isize) {
        let next = (self.cursor as isize + delta).clamp(0, self.len() as isize);
        self.cursor = next as usize;
    }

    fn move_home(&mut self) {
        self.cursor = 0;
    }

    fn move_end(&mut self) {
        self.cursor = self.len();
    }

    fn insert(&mut self, ch: char) {
        if self.len() >= MAX_PROMPT_LEN || ch.is_control() {
            return;
        }
        let idx = self.byte_index(self.cursor);
        self.input.insert(idx, ch);
        self.cursor += 1;
    }

    fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let idx = self.byte_index(self.cursor);
            self.input.remove(idx);
        }
    }

    fn delete(&mut self) {
        if self.cursor < self.len() {
            let idx = self.byte_index(self.cursor);
            self.input.remove(idx);
        }
    }

    /// Trimmed input. An empty name clears it; an empty path keeps the default.
    fn value(&self) -> String {
        let trimmed = self.input.trim();
        match self.purpose {
            PromptPurpose::ImportPath if trimmed.is_empty() => self.default.clone(),
            _ => trimmed.to_string(),
        }
    }

    fn title(&self) -> &'static str {
        match self.purpose {
            PromptPurpose::CharacterName => "Nome del personaggio",
            PromptPurpose::ImportPath => "Importa salvataggio",
        }
    }
}

enum AppEvent {
    Input(Event),
    Tick,
    CatalogLoaded(Result<CatalogLoad, CatalogLoadError>),
    ExportFinished(Result<PathBuf, ExportError>),
}

/// Terminal front end of the character builder.
pub struct DhApp {
    config: AppConfig,
    catalog: CardCatalog,
    client: ResourceClient,
    store: Option<SelectionStore>,
    saved_revision: u64,
    save_manager: SaveManager,
    saves: Vec<SaveEntry>,
    screen: Screen,
    focus: Panel,
    cursors: [usize; 6],
    continue_cursor: usize,
    prompt: Option<PromptModal>,
    pending_export: bool,
    event_tx: Option<mpsc::Sender<AppEvent>>,
    status: String,
    should_quit: bool,
    theme: Theme,
}

impl DhApp {
    pub fn new(config: AppConfig, catalog: CardCatalog, client: ResourceClient) -> Self {
        let save_manager = config.save_manager();
        Self {
            config,
            catalog,
            client,
            store: None,
            saved_revision: 0,
            save_manager,
            saves: Vec::new(),
            screen: Screen::Loading,
            focus: Panel::Class,
            cursors: [0; 6],
            continue_cursor: 0,
            prompt: None,
            pending_export: false,
            event_tx: None,
            status: String::new(),
            should_quit: false,
            theme: Theme::default(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        if let Err(err) = self.refresh_saves() {
            self.set_status(format!("Impossibile leggere i salvataggi: {err}"));
        }

        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx.clone());
        self.event_tx = Some(event_tx);
        self.start_catalog_load();

        loop {
            terminal.draw(|frame| self.draw(frame))?;
            if self.should_quit {
                break;
            }
            let maybe_event = event_rx.recv().await;
            if !self.process_app_event(maybe_event) || self.should_quit {
                break;
            }
        }

        restore_terminal(&mut terminal)?;
        self.event_tx = None;
        Ok(())
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    fn start_catalog_load(&mut self) {
        let Some(tx) = self.event_tx.clone() else {
            return;
        };
        self.set_status(format!("Caricamento catalogo da {}…", self.client.describe()));
        let catalog = self.catalog.clone();
        let client = self.client.clone();
        spawn(async move {
            let result = catalog.load(&client).await;
            let _ = tx.send(AppEvent::CatalogLoaded(result)).await;
        });
    }

    fn process_app_event(&mut self, maybe_event: Option<AppEvent>) -> bool {
        match maybe_event {
            Some(AppEvent::Input(event)) => {
                if let Err(err) = self.handle_input(event) {
                    error!(?err, "input handling failed");
                    self.set_status(format!("Errore: {err}"));
                }
                true
            }
            Some(AppEvent::Tick) => true,
            Some(AppEvent::CatalogLoaded(result)) => {
                self.handle_catalog_loaded(result);
                true
            }
            Some(AppEvent::ExportFinished(result)) => {
                self.pending_export = false;
                match result {
                    Ok(path) => {
                        info!(path = %path.display(), "archive exported");
                        self.set_status(format!("Archivio salvato in {}", path.display()));
                    }
                    Err(err) => {
                        error!(%err, "archive export failed");
                        self.set_status(format!("Esportazione fallita: {err}"));
                    }
                }
                true
            }
            None => false,
        }
    }

    fn handle_catalog_loaded(&mut self, result: Result<CatalogLoad, CatalogLoadError>) {
        match result {
            Ok(CatalogLoad::Ready(index)) => {
                let summary = format!(
                    "Catalogo pronto: {} carte, {} classi",
                    index.len(),
                    index.classes().len()
                );
                match self.store.as_mut() {
                    Some(store) => store.set_catalog(index),
                    None => {
                        let store = SelectionStore::new(index, self.config.rules);
                        self.saved_revision = store.revision();
                        self.store = Some(store);
                    }
                }
                self.screen = Screen::Builder;
                self.set_status(summary);
            }
            Ok(CatalogLoad::InFlight) => {}
            Err(err) => {
                self.screen = Screen::Loading;
                self.set_status(format!("Catalogo non disponibile: {err}"));
            }
        }
    }

    fn refresh_saves(&mut self) -> Result<()> {
        self.saves = self.save_manager.entries()?;
        self.continue_cursor = self
            .continue_cursor
            .min(self.saves.len().saturating_sub(1));
        Ok(())
    }

    fn is_dirty(&self) -> bool {
        self.store
            .as_ref()
            .is_some_and(|store| store.revision() != self.saved_revision)
    }

    fn handle_input(&mut self, event: Event) -> Result<()> {
        let Event::Key(key) = event else {
            return Ok(());
        };
        if self.prompt.is_some() {
            return self.handle_prompt_key(key);
        }
        if key.modifiers == KeyModifiers::CONTROL && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return Ok(());
        }
        match self.screen {
            Screen::Loading => self.handle_loading_key(key),
            Screen::Builder => self.handle_builder_key(key),
            Screen::Continue => self.handle_continue_key(key),
        }
    }

    fn handle_loading_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('r') => {
                if matches!(self.catalog.status(), CatalogStatus::Failed(_)) {
                    self.catalog.clear_error();
                    self.start_catalog_load();
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_builder_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => {
                self.focus = self.focus.step(1);
            }
            KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => {
                self.focus = self.focus.step(-1);
            }
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1),
            KeyCode::PageDown => self.move_cursor(10),
            KeyCode::PageUp => self.move_cursor(-10),
            KeyCode::Enter | KeyCode::Char(' ') => self.activate(),
            KeyCode::Backspace | KeyCode::Delete => self.clear_focused(),
            KeyCode::Char('n') => {
                let current = self
                    .store
                    .as_ref()
                    .map(|store| store.state().character_name().to_string())
                    .unwrap_or_default();
                self.prompt = Some(PromptModal::new(PromptPurpose::CharacterName, current));
            }
            KeyCode::Char('i') => {
                let default = self.save_manager.root().display().to_string();
                self.prompt = Some(PromptModal::new(PromptPurpose::ImportPath, default));
            }
            KeyCode::Char('s') => self.save_character()?,
            KeyCode::Char('c') => {
                self.refresh_saves()?;
                self.screen = Screen::Continue;
            }
            KeyCode::Char('e') => self.start_export(),
            KeyCode::Char('p') => self.print_preview()?,
            KeyCode::Char('m') => self.toggle_domain_mode(),
            KeyCode::Char('b') => self.toggle_bound_subclass(),
            KeyCode::Char('R') => {
                if let Some(store) = self.store.as_mut() {
                    store.reset();
                    self.cursors = [0; 6];
                    self.set_status("Selezione azzerata");
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_continue_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.screen = Screen::Builder,
            KeyCode::Down | KeyCode::Char('j') => {
                if self.continue_cursor + 1 < self.saves.len() {
                    self.continue_cursor += 1;
                }
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.continue_cursor = self.continue_cursor.saturating_sub(1);
            }
            KeyCode::Enter => {
                let entry = self
                    .saves
                    .get(self.continue_cursor)
                    .cloned()
                    .ok_or_else(|| anyhow!("Nessun salvataggio selezionato"))?;
                let save = self.save_manager.load(&entry)?;
                self.apply_save(save, &entry.label());
                self.screen = Screen::Builder;
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) -> Result<()> {
        let mut finalize: Option<(PromptPurpose, String)> = None;
        let mut cancel = false;
        if let Some(prompt) = self.prompt.as_mut() {
            match key.code {
                KeyCode::Esc => cancel = true,
                KeyCode::Enter => finalize = Some((prompt.purpose, prompt.value())),
                KeyCode::Left => prompt.move_cursor(-1),
                KeyCode::Right => prompt.move_cursor(1),
                KeyCode::Home => prompt.move_home(),
                KeyCode::End => prompt.move_end(),
                KeyCode::Backspace => prompt.backspace(),
                KeyCode::Delete => prompt.delete(),
                KeyCode::Char(ch) => {
                    if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT {
                        prompt.insert(ch);
                    }
                }
                _ => {}
            }
        }

        if cancel {
            self.prompt = None;
            return Ok(());
        }

        if let Some((purpose, value)) = finalize {
            self.prompt = None;
            match purpose {
                PromptPurpose::CharacterName => {
                    if let Some(store) = self.store.as_mut() {
                        store.set_character_name(&value);
                    }
                }
                PromptPurpose::ImportPath => {
                    let save = self.save_manager.import(&value)?;
                    self.apply_save(save, &value);
                }
            }
        }
        Ok(())
    }

    fn apply_save(&mut self, save: CharacterSave, label: &str) {
        if self.store.is_none() {
            self.set_status("Catalogo non ancora caricato");
            return;
        }
        let Some(store) = self.store.as_mut() else {
            return;
        };
        store.replace(save.into_state());
        self.saved_revision = store.revision();
        self.cursors = [0; 6];
        let stale = store
            .state()
            .selected_abilities()
            .iter()
            .filter(|id| store.catalog().card(id).is_none())
            .count();
        if stale > 0 {
            warn!(stale, "loaded save references cards missing from the catalog");
            self.set_status(format!(
                "Caricato {label} ({stale} carte non presenti nel catalogo)"
            ));
        } else {
            self.set_status(format!("Caricato {label}"));
        }
    }

    fn save_character(&mut self) -> Result<()> {
        let Some(store) = self.store.as_ref() else {
            return Ok(());
        };
        let save = CharacterSave::capture(store);
        let revision = store.revision();
        let entry = self.save_manager.create_save(&save)?;
        self.saved_revision = revision;
        self.set_status(format!("Salvato in {}", entry.path.display()));
        self.refresh_saves()
    }

    fn start_export(&mut self) {
        if self.pending_export {
            self.set_status("Esportazione già in corso");
            return;
        }
        let (Some(store), Some(tx)) = (self.store.as_ref(), self.event_tx.clone()) else {
            return;
        };
        let save = CharacterSave::capture(store);
        let selection = ExportSelection::from_store(store);
        let path = self.config.export_dir.join(archive_file_name(&save));
        let layout = self.catalog.layout();
        let client = self.client.clone();
        self.pending_export = true;
        self.set_status("Esportazione in corso…");
        spawn(async move {
            let result = async {
                let bytes = build_archive(&client, &layout, &save, &selection).await?;
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&path, bytes).await?;
                Ok::<_, ExportError>(path)
            }
            .await;
            let _ = tx.send(AppEvent::ExportFinished(result)).await;
        });
    }

    fn print_preview(&mut self) -> Result<()> {
        let Some(store) = self.store.as_ref() else {
            return Ok(());
        };
        let cards = ExportSelection::from_store(store).cards_in_print_order();
        let layout = match build_print_layout(&cards) {
            PrintOutcome::NothingToPrint => {
                self.set_status("Nessuna carta da stampare");
                return Ok(());
            }
            PrintOutcome::Ready(layout) => layout,
        };
        let title = match store.state().character_name() {
            "" => "Carte del personaggio".to_string(),
            name => format!("Carte di {name}"),
        };
        let resources = self.catalog.layout();
        let path = self.config.export_dir.join(PREVIEW_FILE);
        layout
            .write_html(&path, &title, |card| {
                self.client.locate(&resources.image_path(card))
            })
            .with_context(|| format!("failed to write {}", path.display()))?;
        match open_preview(&path) {
            Ok(()) => self.set_status(format!(
                "Anteprima di stampa: {} pagine",
                layout.pages.len()
            )),
            Err(err) => {
                warn!(%err, "print preview unavailable");
                self.set_status(format!("{err}"));
            }
        }
        Ok(())
    }

    fn toggle_domain_mode(&mut self) {
        let Some(store) = self.store.as_mut() else {
            return;
        };
        let mut rules = *store.rules();
        rules.domain_mode = match rules.domain_mode {
            DomainMode::Manual => DomainMode::FromClass,
            DomainMode::FromClass => DomainMode::Manual,
        };
        store.set_rules(rules);
        self.set_status(format!("Domini: {}", describe_mode(&rules)));
    }

    fn toggle_bound_subclass(&mut self) {
        let Some(store) = self.store.as_mut() else {
            return;
        };
        let mut rules = *store.rules();
        rules.bound_subclass_cards = !rules.bound_subclass_cards;
        store.set_rules(rules);
        let message = if rules.bound_subclass_cards {
            "Carte di classe limitate alla sottoclasse"
        } else {
            "Tutte le carte di classe"
        };
        self.set_status(message);
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.panel_items(self.focus).len();
        let cursor = &mut self.cursors[self.focus.index()];
        if len == 0 {
            *cursor = 0;
            return;
        }
        let next = (*cursor as isize + delta).clamp(0, len as isize - 1);
        *cursor = next as usize;
    }

    fn activate(&mut self) {
        let items = self.panel_items(self.focus);
        let cursor = self.cursors[self.focus.index()];
        let Some(item) = items.get(cursor) else {
            return;
        };
        let Some(store) = self.store.as_mut() else {
            return;
        };
        let mut notice = None;
        let changed = match &item.action {
            PanelAction::Class(name) => {
                let changed = store.select_class(name);
                self.cursors[Panel::Subclass.index()] = 0;
                self.cursors[Panel::Abilities.index()] = 0;
                changed
            }
            PanelAction::Subclass(name) => {
                if item.selected {
                    store.select_subclass(None)
                } else {
                    store.select_subclass(Some(*name))
                }
            }
            PanelAction::Domain(domain) => {
                let changed = store.toggle_domain(*domain);
                if !changed && !store.rules().domains_are_manual() {
                    notice = Some(
                        "I domini derivano dalla classe (m per la scelta libera)".to_string(),
                    );
                } else if !changed {
                    notice = Some(format!("Al massimo {} domini", rules::MAX_DOMAINS));
                }
                changed
            }
            PanelAction::Ability(id) => store.toggle_ability(id),
            PanelAction::Origin(id) => store.select_origin(Some(id.as_str())),
            PanelAction::Community(id) => store.select_community(Some(id.as_str())),
        };
        if let Some(notice) = notice {
            self.set_status(notice);
        }
        if changed {
            self.clamp_cursors();
        }
    }

    fn clear_focused(&mut self) {
        let Some(store) = self.store.as_mut() else {
            return;
        };
        match self.focus {
            Panel::Subclass => {
                store.select_subclass(None);
            }
            Panel::Origin => {
                store.select_origin(None);
            }
            Panel::Community => {
                store.select_community(None);
            }
            _ => {}
        }
    }

    fn clamp_cursors(&mut self) {
        for panel in Panel::ALL {
            let len = self.panel_items(panel).len();
            let cursor = &mut self.cursors[panel.index()];
            *cursor = (*cursor).min(len.saturating_sub(1));
        }
    }

    fn panel_items(&self, panel: Panel) -> Vec<PanelItem> {
        let Some(store) = self.store.as_ref() else {
            return Vec::new();
        };
        let state = store.state();
        match panel {
            Panel::Class => store
                .catalog()
                .classes()
                .iter()
                .map(|class| PanelItem {
                    label: class.name.clone(),
                    selected: state.class_name() == Some(class.name.as_str()),
                    color: class.primary_domain.map(|domain| self.theme.domain(domain)),
                    action: PanelAction::Class(class.name.clone()),
                })
                .collect(),
            Panel::Subclass => store
                .subclasses()
                .into_iter()
                .map(|name| PanelItem {
                    label: name.to_string(),
                    selected: state.selected_subclass() == Some(name),
                    color: None,
                    action: PanelAction::Subclass(name),
                })
                .collect(),
            Panel::Domains => store
                .available_domains()
                .into_iter()
                .map(|domain| {
                    let info = rules::domain_info(domain);
                    PanelItem {
                        label: format!("{} {}", info.icon, info.label),
                        selected: state.selected_domains().contains(&domain),
                        color: Some(self.theme.domain(domain)),
                        action: PanelAction::Domain(domain),
                    }
                })
                .collect(),
            Panel::Abilities => store
                .cards_by_level()
                .into_iter()
                .flat_map(|(level, cards)| {
                    cards.into_iter().map(move |card| (level, card))
                })
                .map(|(level, card)| PanelItem {
                    label: format!("Lv {level:<2} {}", card_label(card)),
                    selected: state.selected_abilities().contains(&card.id),
                    color: card.domain.map(|domain| self.theme.domain(domain)),
                    action: PanelAction::Ability(card.id.clone()),
                })
                .collect(),
            Panel::Origin => store
                .catalog()
                .origin_cards()
                .into_iter()
                .map(|card| PanelItem {
                    label: card.name.clone(),
                    selected: state.selected_origin() == Some(card.id.as_str()),
                    color: None,
                    action: PanelAction::Origin(card.id.clone()),
                })
                .collect(),
            Panel::Community => store
                .catalog()
                .community_cards()
                .into_iter()
                .map(|card| PanelItem {
                    label: card.name.clone(),
                    selected: state.selected_community() == Some(card.id.as_str()),
                    color: None,
                    action: PanelAction::Community(card.id.clone()),
                })
                .collect(),
        }
    }

    fn draw(&mut self, frame: &mut Frame) {
        match self.screen {
            Screen::Loading => self.draw_loading(frame),
            Screen::Builder => self.draw_builder(frame),
            Screen::Continue => self.draw_continue(frame),
        }
        if let Some(prompt) = &self.prompt {
            self.render_prompt(frame, prompt);
        }
    }

    fn draw_loading(&self, frame: &mut Frame) {
        let area = frame.size();
        let failed = matches!(self.catalog.status(), CatalogStatus::Failed(_));
        let mut lines = vec![
            Line::from(Span::styled(
                "Daggerheart · Creazione del personaggio",
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(self.status.clone()),
        ];
        if failed {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "r riprova  ·  q esci",
                Style::default().fg(self.theme.warning),
            )));
        }
        let height = (lines.len() as u16 + 2).min(area.height);
        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Catalogo"))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, centered_rect(72, height, area));
    }

    fn draw_builder(&mut self, frame: &mut Frame) {
        let area = frame.size();
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(4),
            ])
            .split(area);
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(28),
                Constraint::Percentage(40),
                Constraint::Percentage(32),
            ])
            .split(rows[1]);
        let left = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(6),
                Constraint::Length(4),
                Constraint::Length(6),
            ])
            .split(columns[0]);
        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage(30),
                Constraint::Percentage(30),
                Constraint::Percentage(40),
            ])
            .split(columns[2]);

        self.render_header(frame, rows[0]);
        self.render_panel(frame, left[0], Panel::Class);
        self.render_panel(frame, left[1], Panel::Subclass);
        self.render_panel(frame, left[2], Panel::Domains);
        self.render_panel(frame, columns[1], Panel::Abilities);
        self.render_panel(frame, right[0], Panel::Origin);
        self.render_panel(frame, right[1], Panel::Community);
        self.render_class_cards(frame, right[2]);
        self.render_status(frame, rows[2]);
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let state = store.state();
        let name = match state.character_name() {
            "" => "(senza nome)",
            name => name,
        };
        let mut spans = vec![
            Span::styled(
                name.to_string(),
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::raw(state.class_name().unwrap_or("—").to_string()),
        ];
        if let Some(subclass) = state.selected_subclass() {
            spans.push(Span::raw(format!(" / {subclass}")));
        }
        for domain in state.selected_domains() {
            let info = rules::domain_info(*domain);
            spans.push(Span::raw("  "));
            spans.push(Span::styled(
                format!("{} {}", info.icon, info.label),
                Style::default().fg(self.theme.domain(*domain)),
            ));
        }
        spans.push(Span::styled(
            format!("  abilità: {}", state.selected_abilities().len()),
            Style::default().fg(self.theme.muted),
        ));
        if self.is_dirty() {
            spans.push(Span::styled(
                "  • modificato",
                Style::default().fg(self.theme.warning),
            ));
        }
        let paragraph = Paragraph::new(Line::from(spans))
            .block(Block::default().borders(Borders::ALL).title("Personaggio"));
        frame.render_widget(paragraph, area);
    }

    fn render_panel(&self, frame: &mut Frame, area: Rect, panel: Panel) {
        let items = self.panel_items(panel);
        let focused = self.focus == panel;
        let border_style = if focused {
            Style::default().fg(self.theme.accent)
        } else {
            Style::default().fg(self.theme.muted)
        };
        let mut title = panel.title().to_string();
        let manual = self
            .store
            .as_ref()
            .is_some_and(|store| store.rules().domains_are_manual());
        if panel == Panel::Domains && !manual {
            title.push_str(" (dalla classe)");
        }
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(title);

        if items.is_empty() {
            let hint = match panel {
                Panel::Subclass | Panel::Domains => "Scegli una classe",
                Panel::Abilities => "Nessun dominio selezionato",
                _ => "Nessuna carta",
            };
            let paragraph = Paragraph::new(Line::from(Span::styled(
                hint,
                Style::default().fg(self.theme.muted),
            )))
            .block(block);
            frame.render_widget(paragraph, area);
            return;
        }

        let list_items: Vec<ListItem> = items
            .iter()
            .map(|item| {
                let marker = if item.selected {
                    Span::styled("● ", Style::default().fg(self.theme.success))
                } else {
                    Span::raw("  ")
                };
                let mut style = Style::default().fg(item.color.unwrap_or(self.theme.primary_fg));
                if item.selected {
                    style = style.add_modifier(Modifier::BOLD);
                }
                ListItem::new(Line::from(vec![marker, Span::styled(item.label.clone(), style)]))
            })
            .collect();

        let mut list_state = ListState::default();
        if focused {
            list_state.select(Some(cmp::min(
                self.cursors[panel.index()],
                items.len() - 1,
            )));
        }
        let list = List::new(list_items)
            .block(block)
            .highlight_style(Style::default().bg(self.theme.selection_bg));
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn render_class_cards(&self, frame: &mut Frame, area: Rect) {
        let lines: Vec<Line> = self
            .store
            .as_ref()
            .map(|store| {
                store
                    .class_cards()
                    .into_iter()
                    .map(|card| {
                        let kind = card.card_type.as_deref().unwrap_or("");
                        Line::from(vec![
                            Span::raw(card_label(card)),
                            Span::styled(
                                format!("  {kind}"),
                                Style::default().fg(self.theme.muted),
                            ),
                        ])
                    })
                    .collect()
            })
            .unwrap_or_default();
        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Carte di classe"))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn draw_continue(&mut self, frame: &mut Frame) {
        let area = frame.size();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(5), Constraint::Length(4)])
            .split(area);

        let mut list_state = ListState::default();
        let items: Vec<ListItem> = if self.saves.is_empty() {
            vec![ListItem::new(Line::from("  Nessun salvataggio"))]
        } else {
            list_state.select(Some(self.continue_cursor.min(self.saves.len() - 1)));
            self.saves
                .iter()
                .enumerate()
                .map(|(idx, entry)| {
                    let marker = if idx == self.continue_cursor {
                        Span::styled("▶ ", Style::default().fg(self.theme.accent))
                    } else {
                        Span::raw("  ")
                    };
                    let timestamp = entry.updated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M");
                    let class_name = entry.class_name.as_deref().unwrap_or("—");
                    ListItem::new(Line::from(vec![
                        marker,
                        Span::raw(format!("{}  {}  [{}]", entry.label(), class_name, timestamp)),
                    ]))
                })
                .collect()
        };

        let title = format!("Salvataggi in {}", self.save_manager.root().display());
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(Style::default().bg(self.theme.selection_bg));
        frame.render_stateful_widget(list, chunks[0], &mut list_state);
        self.render_status(frame, chunks[1]);
    }

    fn render_prompt(&self, frame: &mut Frame, prompt: &PromptModal) {
        let frame_area = frame.size();
        let width = cmp::max(cmp::min(72_u16, frame_area.width.saturating_sub(4)), 24_u16);
        let height = 6_u16.min(frame_area.height.saturating_sub(2)).max(5_u16);
        let area = centered_rect(width, height, frame_area);

        frame.render_widget(Clear, area);

        let input_line = Line::from(vec![
            Span::styled("> ", Style::default().fg(self.theme.accent)),
            Span::raw(prompt.input.clone()),
        ]);
        let helper = Line::from(vec![
            Span::styled("Invio", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" conferma  "),
            Span::styled("Esc", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" annulla"),
        ]);
        let paragraph = Paragraph::new(vec![input_line, Line::from(""), helper])
            .block(Block::default().borders(Borders::ALL).title(prompt.title()))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);

        let cursor_x =
            (area.x + 3 + prompt.cursor as u16).min(area.x + area.width.saturating_sub(2));
        frame.set_cursor(cursor_x, area.y + 1);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let status_style = if self.status.starts_with("Errore") || self.status.contains("fallit") {
            Style::default().fg(self.theme.danger)
        } else {
            Style::default().fg(self.theme.primary_fg)
        };
        let help = match self.screen {
            Screen::Continue => "Invio carica  ·  Esc indietro",
            _ => "Tab pannello  Invio scegli  n nome  s salva  c carica  i importa  e esporta  p stampa  m domini  b carte  R azzera  q esci",
        };
        let rules_line = self
            .store
            .as_ref()
            .map(|store| describe_mode(store.rules()))
            .unwrap_or_default();
        let paragraph = Paragraph::new(vec![
            Line::from(Span::styled(self.status.clone(), status_style)),
            Line::from(Span::styled(
                format!("{help}  [{rules_line}]"),
                Style::default().fg(self.theme.muted),
            )),
        ])
        .block(Block::default().borders(Borders::ALL).title("Stato"))
        .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }
}

fn describe_mode(rules: &RuleSet) -> String {
    let domains = match rules.domain_mode {
        DomainMode::Manual => "domini liberi",
        DomainMode::FromClass => "domini dalla classe",
    };
    let cards = if rules.bound_subclass_cards {
        "carte per sottoclasse"
    } else {
        "tutte le carte di classe"
    };
    format!("{domains}, {cards}")
}

fn card_label(card: &Card) -> String {
    match card.threshold {
        Some(threshold) => format!("{} ({threshold})", card.name),
        None => card.name.clone(),
    }
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}
