mod end_to_end;
mod policies;
mod pwm;
mod scheduler;
mod sweep;
