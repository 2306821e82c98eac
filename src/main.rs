/*!
 * Command-line interface for attrsnap
 */

use std::process;

use clap::{CommandFactory, Parser};

use attrsnap::config::{Args, Command, RestoreConfig, SaveConfig};
use attrsnap::error::EXIT_GENERIC;
use attrsnap::{interrupt, run};

fn main() {
    let args = Args::parse();

    if let Some(shell) = args.generate {
        let mut command = Args::command();
        let name = command.get_name().to_string();
        clap_complete::generate(shell, &mut command, name, &mut std::io::stdout());
        return;
    }

    let Some(command) = args.command else {
        eprintln!("You have to use either save or restore.\nRead the help.");
        process::exit(EXIT_GENERIC);
    };

    interrupt::install();

    let result = match command {
        Command::Save(save_args) => run::run_save(&SaveConfig::from_args(save_args)),
        Command::Restore(restore_args) => {
            run::run_restore(&RestoreConfig::from_args(restore_args))
        }
    };

    if let Err(err) = result {
        eprintln!("ERROR: {err}");
        process::exit(err.exit_code());
    }
}
