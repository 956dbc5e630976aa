//! Scripted backend shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use mail_stats_db::prelude::*;

/// One scripted fetch outcome.
pub enum Step {
    Done,
    NoRows { affected: u64 },
    Rows(Vec<Vec<Option<String>>>),
    Timeout,
    Unexpected(i32),
    Error(i32, String),
}

#[derive(Default)]
pub struct ScriptState {
    pub steps: VecDeque<Step>,
    pub submitted: Vec<String>,
    pub options: Vec<ConnOption>,
    pub option_results: VecDeque<Result<(), OptionError>>,
    pub bind_error: Option<String>,
    pub bound: bool,
    pub closed: bool,
}

pub type SharedScript = Rc<RefCell<ScriptState>>;

pub fn shared() -> SharedScript {
    Rc::new(RefCell::new(ScriptState::default()))
}

pub fn push_steps(state: &SharedScript, steps: Vec<Step>) {
    state.borrow_mut().steps.extend(steps);
}

pub fn row(cells: &[Option<&str>]) -> Vec<Option<String>> {
    cells.iter().map(|cell| cell.map(str::to_owned)).collect()
}

/// A connection that replays its scripted fetch outcomes and records every
/// command, option, and bind it sees. Escaping doubles single quotes.
pub struct ScriptedConnection {
    pub state: SharedScript,
}

impl Escape for ScriptedConnection {
    fn escape(&mut self, raw: &str) -> Result<String, BackendError> {
        Ok(raw.replace('\'', "''"))
    }
}

impl Connection for ScriptedConnection {
    fn set_option(&mut self, option: &ConnOption) -> Result<(), OptionError> {
        let mut state = self.state.borrow_mut();
        state.options.push(option.clone());
        state.option_results.pop_front().unwrap_or(Ok(()))
    }

    fn bind(
        &mut self,
        _database: Option<&str>,
        _user: Option<&str>,
        _password: Option<&str>,
    ) -> Result<(), BackendError> {
        let mut state = self.state.borrow_mut();
        if let Some(message) = state.bind_error.take() {
            return Err(BackendError::new(message));
        }
        state.bound = true;
        Ok(())
    }

    fn submit(&mut self, command: &str) -> Result<(), BackendError> {
        self.state.borrow_mut().submitted.push(command.to_owned());
        Ok(())
    }

    fn fetch_result(&mut self, _timeout: Duration) -> Result<Fetched, BackendError> {
        match self.state.borrow_mut().steps.pop_front() {
            None | Some(Step::Done) => Ok(Fetched::Done),
            Some(Step::NoRows { affected }) => Ok(Fetched::NoRows { affected }),
            Some(Step::Rows(rows)) => Ok(Fetched::Rows(Box::new(ScriptedRows::new(rows)))),
            Some(Step::Timeout) => Ok(Fetched::Timeout),
            Some(Step::Unexpected(code)) => Ok(Fetched::Unexpected(code)),
            Some(Step::Error(code, message)) => Err(BackendError::with_code(code, message)),
        }
    }

    fn close(&mut self) {
        self.state.borrow_mut().closed = true;
    }
}

pub struct ScriptedRows {
    rows: Vec<Vec<Option<String>>>,
    cursor: Option<usize>,
}

impl ScriptedRows {
    fn new(rows: Vec<Vec<Option<String>>>) -> ScriptedRows {
        ScriptedRows { rows, cursor: None }
    }
}

impl RowStream for ScriptedRows {
    fn next_row(&mut self) -> bool {
        let next = self.cursor.map_or(0, |current| current + 1);
        if next < self.rows.len() {
            self.cursor = Some(next);
            true
        } else {
            self.cursor = Some(self.rows.len());
            false
        }
    }

    fn column_count(&self) -> usize {
        self.cursor.and_then(|i| self.rows.get(i)).map_or(0, Vec::len)
    }

    fn column_text(&self, index: usize) -> Option<&str> {
        self.rows.get(self.cursor?)?.get(index)?.as_deref()
    }
}

pub struct ScriptedDriver {
    pub state: SharedScript,
    pub refuse: bool,
    pub connects: RefCell<Vec<(String, Option<String>, Option<String>)>>,
}

impl ScriptedDriver {
    pub fn new(state: SharedScript) -> ScriptedDriver {
        ScriptedDriver {
            state,
            refuse: false,
            connects: RefCell::new(Vec::new()),
        }
    }
}

impl Driver for ScriptedDriver {
    fn connect(
        &self,
        kind: &str,
        host: Option<&str>,
        port: Option<&str>,
    ) -> Result<Box<dyn Connection>, BackendError> {
        self.connects.borrow_mut().push((
            kind.to_owned(),
            host.map(str::to_owned),
            port.map(str::to_owned),
        ));
        if self.refuse {
            return Err(BackendError::new("unknown backend"));
        }
        Ok(Box::new(ScriptedConnection {
            state: Rc::clone(&self.state),
        }))
    }
}

/// Configure, connect, and hand back a live session over the script.
pub fn live_session(config: DbConfig, state: &SharedScript) -> Session {
    let mut session = Session::new(config);
    let driver = ScriptedDriver::new(Rc::clone(state));
    session.connect(&driver).expect("scripted connect");
    session
}
