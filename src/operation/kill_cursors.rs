use crate::{
    bson::doc,
    cmap::{Command, RawCommandResponse},
    error::Result,
    operation::Operation,
    options::CommandOption,
    sdam::ServerDescription,
    Namespace,
};

/// A `killCursors` command, releasing a cursor's server-side resources.
#[derive(Debug)]
pub(crate) struct KillCursors {
    ns: Namespace,
    cursor_id: i64,
    options: Vec<CommandOption>,
}

impl KillCursors {
    pub(crate) fn new(ns: Namespace, cursor_id: i64) -> Self {
        Self {
            ns,
            cursor_id,
            options: Vec::new(),
        }
    }
}

impl Operation for KillCursors {
    type O = ();
    const NAME: &'static str = "killCursors";

    fn validate(&self) -> Result<()> {
        self.ns.validate()
    }

    fn build(&self, _description: &ServerDescription) -> Result<Command> {
        self.validate()?;

        let body = doc! {
            Self::NAME: self.ns.coll.clone(),
            "cursors": [self.cursor_id],
        };
        Ok(Command::new_read(Self::NAME, self.ns.db.clone(), None, body))
    }

    fn handle_response(
        &self,
        _response: &RawCommandResponse,
        _description: &ServerDescription,
    ) -> Result<Self::O> {
        Ok(())
    }

    fn options(&self) -> &[CommandOption] {
        &self.options
    }

    fn options_mut(&mut self) -> &mut Vec<CommandOption> {
        &mut self.options
    }
}
