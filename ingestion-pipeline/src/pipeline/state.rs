use state_machines::state_machine;

state_machine! {
    name: IngestionRunMachine,
    state: IngestionRunState,
    initial: Idle,
    states: [Idle, Running, Done, Failed],
    events {
        start { transition: { from: Idle, to: Running } }
        finish { transition: { from: Running, to: Done } }
        abort {
            transition: { from: Idle, to: Failed }
            transition: { from: Running, to: Failed }
        }
    }
}

pub fn idle() -> IngestionRunMachine<(), Idle> {
    IngestionRunMachine::new(())
}
