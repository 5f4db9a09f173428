pub mod player_states;
